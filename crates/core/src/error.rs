//! Core error types

use thiserror::Error;

/// Errors that cross the measurement pipeline boundary.
///
/// Anything that reaches the supervisor is one of these. Local, retried
/// conditions (echo timeouts, rejected samples) never become an `Error`.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or out-of-range configuration or calibration value
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// GPIO acquisition or pin I/O failure
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// The reading sink rejected a write
    #[error("Sink failure: {0}")]
    SinkFailure(String),

    /// The calibration source could not be read
    #[error("Calibration unavailable: {0}")]
    CalibrationUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidConfiguration`].
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
