//! Error types for loadgen-core

use thiserror::Error;

/// Core error type
///
/// Only configuration and lifecycle misuse surface through this type.
/// Per-item failures stay at the item boundary as [`crate::WorkerError`].
#[derive(Error, Debug)]
pub enum LoadGenError {
    /// Configuration failed validation
    #[error("configuration error: {0}")]
    Config(String),

    /// A required builder field was never set
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// Argument can never be satisfied
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not allowed in the current lifecycle state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Background data collection failed
    #[error("collector error: {0}")]
    Collector(String),

    /// Worker pool failed to shut down cleanly
    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

impl LoadGenError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a missing configuration error
    pub fn missing_config(field: &'static str) -> Self {
        Self::MissingConfig(field)
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, LoadGenError>;
