//! Client agent configuration loaded from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use taskwire_shared::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_PORT, RECONNECT_DELAY_SECS};

/// Client agent configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address to connect to.
    /// Env: `TASKWIRE_SERVER_ADDR`
    /// Default: `127.0.0.1:5555`
    pub server_addr: SocketAddr,

    /// Explicit client id.  `None` falls back to the stored identity from a
    /// previous successful login.
    /// Env: `TASKWIRE_CLIENT_ID`
    pub client_id: Option<String>,

    /// Explicit identity file path.  `None` uses the platform config
    /// directory.
    /// Env: `TASKWIRE_IDENTITY_PATH`
    pub identity_path: Option<PathBuf>,

    /// TCP connect timeout.
    /// Env: `TASKWIRE_CONNECT_TIMEOUT_SECS`
    /// Default: 5
    pub connect_timeout: Duration,

    /// Delay before a reconnect attempt after a lost connection.
    /// Env: `TASKWIRE_RECONNECT_DELAY_SECS`
    /// Default: 5
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: ([127, 0, 0, 1], DEFAULT_PORT).into(),
            client_id: None,
            identity_path: None,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            reconnect_delay: Duration::from_secs(RECONNECT_DELAY_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("TASKWIRE_SERVER_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.server_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid TASKWIRE_SERVER_ADDR, using default");
            }
        }

        if let Ok(id) = std::env::var("TASKWIRE_CLIENT_ID") {
            if !id.trim().is_empty() {
                config.client_id = Some(id.trim().to_string());
            }
        }

        if let Ok(path) = std::env::var("TASKWIRE_IDENTITY_PATH") {
            config.identity_path = Some(PathBuf::from(path));
        }

        if let Ok(val) = std::env::var("TASKWIRE_CONNECT_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.connect_timeout = Duration::from_secs(secs);
            }
        }

        if let Ok(val) = std::env::var("TASKWIRE_RECONNECT_DELAY_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.reconnect_delay = Duration::from_secs(secs);
            }
        }

        config
    }
}
