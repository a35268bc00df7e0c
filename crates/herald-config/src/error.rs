use thiserror::Error;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration loading error: {message}")]
    Loading { message: String },

    #[error("Configuration validation error: {message}")]
    Validation { message: String },

    #[error("File error: {message}")]
    File { message: String },

    #[error("Config builder error: {source}")]
    ConfigBuilder {
        #[from]
        source: config::ConfigError,
    },
}

impl ConfigError {
    /// Create a loading error
    pub fn loading(message: impl Into<String>) -> Self {
        Self::Loading {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a file error
    pub fn file(message: impl Into<String>) -> Self {
        Self::File {
            message: message.into(),
        }
    }

    /// Configuration problems never fix themselves
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Get the error category
    pub fn category(&self) -> &'static str {
        match self {
            Self::Loading { .. } => "loading",
            Self::Validation { .. } => "validation",
            Self::File { .. } => "file",
            Self::ConfigBuilder { .. } => "builder",
        }
    }
}

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
