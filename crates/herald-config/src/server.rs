use crate::duration::humantime_serde;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Trust the first `X-Forwarded-For` entry as the visitor's address
    pub behind_proxy: bool,
    /// Interval between keepalive events on open streams
    #[serde(with = "humantime_serde")]
    pub keepalive_interval: Duration,
    /// Interval between background sweeps
    #[serde(with = "humantime_serde")]
    pub manager_interval: Duration,
    /// Graceful shutdown timeout
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            behind_proxy: false,
            keepalive_interval: Duration::from_secs(45),
            manager_interval: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate the server configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.is_empty() {
            return Err(crate::ConfigError::validation(
                "Server host cannot be empty",
            ));
        }

        if self.port == 0 {
            return Err(crate::ConfigError::validation("Server port must be > 0"));
        }

        if self.keepalive_interval.is_zero() {
            return Err(crate::ConfigError::validation(
                "Keepalive interval must be > 0",
            ));
        }

        if self.manager_interval.is_zero() {
            return Err(crate::ConfigError::validation(
                "Manager interval must be > 0",
            ));
        }

        Ok(())
    }
}
