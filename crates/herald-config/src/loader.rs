use crate::{Config, ConfigError, Result};
use config::{ConfigBuilder, Environment, File};
use std::path::Path;

/// Configuration loader with support for multiple sources
pub struct ConfigLoader {
    builder: ConfigBuilder<config::builder::DefaultState>,
    env_prefix: String,
    files: Vec<String>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            builder: config::Config::builder(),
            env_prefix: "HERALD".to_string(),
            files: Vec::new(),
        }
    }

    /// Add a configuration file
    pub fn with_file(mut self, path: &str) -> Self {
        self.files.push(path.to_string());
        self
    }

    /// Set environment variable prefix
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Load configuration from all sources
    pub fn load(mut self) -> Result<Config> {
        // Sections not mentioned by any source fall back to serde defaults
        self.builder = self.builder.set_default("server.host", "0.0.0.0")?;
        self.builder = self.builder.set_default("server.port", 8080)?;
        self.builder = self.builder.set_default("logging.level", "info")?;
        self.builder = self.builder.set_default("logging.format", "pretty")?;

        for file_path in &self.files {
            if Path::new(file_path).exists() {
                self.builder = self.builder.add_source(File::with_name(file_path));
            } else {
                return Err(ConfigError::file(format!(
                    "Configuration file not found: {}",
                    file_path
                )));
            }
        }

        // HERALD_CACHE__MAX_MESSAGES -> cache.max_messages
        self.builder = self.builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = self.builder.build()?;
        let app_config: Config = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
