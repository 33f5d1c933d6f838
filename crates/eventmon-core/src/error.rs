//! Error types for EventMon

use thiserror::Error;

/// Result type alias using EventMon's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for EventMon operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid setting
    #[error("Configuration error: {0}")]
    Config(String),

    /// Settings could not be loaded or deserialized
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Monitor definition that cannot become a working monitor
    #[error("Validation error: {0}")]
    Validation(String),

    /// No runtime is available to drive scheduled work
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Not found error
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of the missing entity
        entity: String,
        /// Identifier that was looked up
        id: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
