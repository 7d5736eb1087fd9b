//! Error types for the detector subsystem.

use thiserror::Error;

/// Errors that can occur when invoking the tile classifier.
#[derive(Error, Debug)]
pub enum DetectorError {
    /// HTTP transport failure reaching the classification service
    #[error("classifier request failed: {0}")]
    Http(String),

    /// The service answered but the payload was not understood
    #[error("malformed classifier response: {0}")]
    InvalidResponse(String),

    /// The classifier reported coordinates inconsistent with its match flags
    #[error("inconsistent detection: {reason}")]
    Inconsistent {
        /// What was inconsistent
        reason: String,
    },

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for detector operations.
pub type Result<T> = std::result::Result<T, DetectorError>;
