//! Error types for volume data and configuration.

use thiserror::Error;

/// Errors raised while building or configuring volume data.
#[derive(Error, Debug)]
pub enum VolumeError {
    /// A grid dimension was zero.
    #[error("invalid grid dimensions {0}x{1}x{2}: every dimension must be positive")]
    InvalidDimensions(u32, u32, u32),

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A configuration value is out of range.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// The background generation worker went away before producing a field.
    #[error("density generation worker terminated without a result")]
    GenerationFailed,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for volume data operations.
pub type Result<T> = std::result::Result<T, VolumeError>;
