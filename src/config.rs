//! Server configuration
//!
//! Defaults match the bundled test client. The bind address can be
//! overridden from the command line or the environment.

use std::env;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Environment variable consulted when no address argument is given
pub const ADDR_ENV: &str = "ROOM_SYNC_ADDR";

/// Default WebSocket endpoint path
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Channel buffer size for server commands
pub const COMMAND_BUFFER_SIZE: usize = 256;

/// Channel buffer size for each connection's outbound messages
pub const OUTBOUND_BUFFER_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the listener to
    pub addr: String,
    /// Path the WebSocket handshake must target
    pub ws_path: String,
    /// Capacity of the actor command channel
    pub command_buffer: usize,
    /// Capacity of each connection's outbound channel
    pub outbound_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            ws_path: DEFAULT_WS_PATH.to_string(),
            command_buffer: COMMAND_BUFFER_SIZE,
            outbound_buffer: OUTBOUND_BUFFER_SIZE,
        }
    }
}

impl Config {
    /// Build the configuration from process arguments and environment
    ///
    /// The first argument wins over `ROOM_SYNC_ADDR`.
    pub fn from_env() -> Self {
        Self::resolve(env::args().nth(1), env::var(ADDR_ENV).ok())
    }

    fn resolve(arg: Option<String>, env_addr: Option<String>) -> Self {
        let addr = arg
            .or(env_addr)
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        Self {
            addr,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::resolve(None, None);
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.ws_path, "/ws");
    }

    #[test]
    fn test_argument_overrides_env() {
        let config = Config::resolve(Some("0.0.0.0:9000".into()), Some("0.0.0.0:9001".into()));
        assert_eq!(config.addr, "0.0.0.0:9000");

        let config = Config::resolve(None, Some("0.0.0.0:9001".into()));
        assert_eq!(config.addr, "0.0.0.0:9001");
    }
}
