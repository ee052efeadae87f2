//! Error types shared across the match index crates.

use thiserror::Error;

/// Errors raised while loading or validating [`Settings`](crate::Settings).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Layered config could not be built or deserialized
    #[error("Configuration error: {0}")]
    Load(String),

    /// A setting holds a value outside its allowed range
    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}
