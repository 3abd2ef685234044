/// Default TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 5555;

/// Maximum frame payload size in bytes (1 MiB).
///
/// A length prefix above this is treated as a protocol error and terminates
/// the connection.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// How long the server waits for the login frame before closing the
/// connection.
pub const LOGIN_TIMEOUT_SECS: u64 = 30;

/// Client-side timeout for establishing the TCP connection.
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Delay between client reconnect attempts after a transient failure.
pub const RECONNECT_DELAY_SECS: u64 = 5;

/// Interval between reminder scheduler passes.
pub const REMINDER_INTERVAL_SECS: u64 = 60;

/// Reserved notification target meaning "every active client".
pub const BROADCAST_SENTINEL: &str = "ALL";
