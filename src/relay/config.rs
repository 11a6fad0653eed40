//! Relay configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Host address to listen on
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds to wait for upstream response headers (default: 120).
    /// Streamed bodies are not cut off by this limit.
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    /// Seconds to wait for the upstream TCP connection (default: 10)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream_timeout_secs: default_upstream_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl RelayConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Check value ranges, returning a description of the first problem
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must not be 0".to_string());
        }
        if self.upstream_timeout_secs == 0 || self.upstream_timeout_secs > 600 {
            return Err(format!(
                "invalid upstream timeout: {} (must be between 1 and 600 seconds)",
                self.upstream_timeout_secs
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err("connect timeout must not be 0".to_string());
        }
        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8848
}

fn default_upstream_timeout() -> u64 {
    120
}

fn default_connect_timeout() -> u64 {
    10
}
