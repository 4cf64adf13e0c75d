//! Protocol server configuration from TOML (`[server]` section)

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw server configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileServerConfig {
    /// Address to bind the client listener on
    pub host: String,
    pub port: u16,
    /// Listen backlog passed to the socket
    pub backlog: u32,
    /// Largest accepted request, in bytes
    pub max_message_size: usize,
    /// Pause between connections, in milliseconds (0 disables)
    pub pause_ms: u64,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            backlog: 10,
            max_message_size: 1024 * 1024,
            pause_ms: 100,
        }
    }
}

impl FileServerConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    /// `host:port` for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
