//! Configuration loading errors.

use thiserror::Error;

/// Error type for configuration loading
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    Validation(String),

    #[error("Failed to parse configuration document: {0}")]
    Parse(String),
}
