//! # Herald Configuration
//!
//! Typed configuration for the herald server, loaded from built-in
//! defaults, an optional TOML file and `HERALD_*` environment variables.
//!
//! ## Sections
//!
//! - `server`: listener, keepalive and background sweep intervals
//! - `auth`: default topic access plus seeded tiers and accounts
//! - `cache`: per-topic replay buffer bounds
//! - `visitor`: anonymous quotas and idle eviction
//! - `logging`: level and output format

pub mod auth;
mod duration;
pub mod error;
pub mod limits;
pub mod loader;
pub mod server;

use derive_setters::Setters;
use serde::{Deserialize, Serialize};

pub use auth::{AuthConfig, TierSeed, UserSeed};
pub use error::{ConfigError, Result};
pub use limits::{CacheConfig, VisitorConfig};
pub use loader::ConfigLoader;
pub use server::ServerConfig;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Access control and account seeds
    pub auth: AuthConfig,
    /// Replay buffer configuration
    pub cache: CacheConfig,
    /// Visitor quota configuration
    pub visitor: VisitorConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from default sources
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &str) -> Result<Self> {
        ConfigLoader::new().with_file(path).load()
    }

    /// Render the default configuration as TOML
    pub fn generate_default() -> Result<String> {
        toml::to_string_pretty(&Self::default())
            .map_err(|e| ConfigError::loading(format!("Failed to render configuration: {e}")))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.auth.validate()?;
        self.cache.validate()?;
        self.visitor.validate()?;
        self.validate_logging()?;
        Ok(())
    }

    fn validate_logging(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::validation(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::validation(format!(
                "Invalid log format: {}. Must be one of: {}",
                self.logging.format,
                valid_formats.join(", ")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::Permission;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_config_default() {
        let actual = Config::default();
        assert_eq!(actual.server.host, "0.0.0.0");
        assert_eq!(actual.auth.default_access, Permission::ReadWrite);
        assert_eq!(actual.cache.max_messages, 1000);
        assert_eq!(actual.logging.level, "info");
    }

    #[test]
    fn test_config_setters() {
        let actual = Config::default()
            .logging(LoggingConfig::default().level("debug"))
            .auth(AuthConfig::default().default_access(Permission::ReadOnly));

        assert_eq!(actual.logging.level, "debug");
        assert_eq!(actual.auth.default_access, Permission::ReadOnly);
    }

    #[test]
    fn test_config_validation_success() {
        let fixture = Config::default();
        let actual = fixture.validate();
        assert!(actual.is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let fixture = Config::default().logging(LoggingConfig::default().format("xml"));

        let actual = fixture.validate();
        assert!(actual.is_err());
    }

    #[test]
    fn test_generate_default_round_trip() {
        let serialized = Config::generate_default().unwrap();
        let actual: Config = toml::from_str(&serialized).unwrap();
        let expected = Config::default();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let fixture = r#"
[cache]
duration = "1h"

[auth]
default_access = "deny-all"
"#;
        let actual: Config = toml::from_str(fixture).unwrap();
        assert_eq!(actual.cache.duration, Duration::from_secs(3600));
        assert_eq!(actual.cache.max_messages, 1000);
        assert_eq!(actual.auth.default_access, Permission::DenyAll);
        assert_eq!(actual.server.port, 8080);
    }
}
