//! Error types for reading storage.

use thiserror::Error;

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Calibration value missing: {key}")]
    MissingCalibration { key: &'static str },

    #[error("Invalid stored timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
