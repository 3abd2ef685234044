//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use taskwire_shared::constants::{DEFAULT_PORT, LOGIN_TIMEOUT_SECS, REMINDER_INTERVAL_SECS};

/// How the handshake treats a login from an identifier that is not in the
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// Auto-provision a new client identity and proceed as success.
    Open,
    /// Reply `invalid_id` and close the connection.
    Strict,
}

impl IdentityPolicy {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP socket address to listen on.
    /// Env: `TASKWIRE_LISTEN_ADDR`
    /// Default: `0.0.0.0:5555`
    pub listen_addr: SocketAddr,

    /// Explicit database file path.  `None` uses the platform data directory.
    /// Env: `TASKWIRE_DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Unknown-identifier handling during the handshake.
    /// Env: `TASKWIRE_IDENTITY_POLICY` (`open` / `strict`)
    /// Default: `open`
    pub identity_policy: IdentityPolicy,

    /// How long a connection may sit in AwaitLogin before it is closed.
    /// Env: `TASKWIRE_LOGIN_TIMEOUT_SECS`
    /// Default: 30
    pub login_timeout: Duration,

    /// Interval between reminder scheduler passes.
    /// Env: `TASKWIRE_REMINDER_INTERVAL_SECS`
    /// Default: 60
    pub reminder_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], DEFAULT_PORT).into(),
            db_path: None,
            identity_policy: IdentityPolicy::Open,
            login_timeout: Duration::from_secs(LOGIN_TIMEOUT_SECS),
            reminder_interval: Duration::from_secs(REMINDER_INTERVAL_SECS),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("TASKWIRE_LISTEN_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.listen_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid TASKWIRE_LISTEN_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("TASKWIRE_DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Ok(policy) = std::env::var("TASKWIRE_IDENTITY_POLICY") {
            match IdentityPolicy::parse(&policy) {
                Some(parsed) => config.identity_policy = parsed,
                None => {
                    tracing::warn!(
                        value = %policy,
                        "Invalid TASKWIRE_IDENTITY_POLICY, using default (open)"
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("TASKWIRE_LOGIN_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.login_timeout = Duration::from_secs(secs);
            }
        }

        if let Ok(val) = std::env::var("TASKWIRE_REMINDER_INTERVAL_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.reminder_interval = Duration::from_secs(secs);
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, ([0, 0, 0, 0], DEFAULT_PORT).into());
        assert_eq!(config.identity_policy, IdentityPolicy::Open);
        assert_eq!(config.reminder_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_parse_identity_policy() {
        assert_eq!(IdentityPolicy::parse("open"), Some(IdentityPolicy::Open));
        assert_eq!(IdentityPolicy::parse("STRICT"), Some(IdentityPolicy::Strict));
        assert_eq!(IdentityPolicy::parse("maybe"), None);
    }
}
