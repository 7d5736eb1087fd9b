//! Error types for the challenge solver.

use tessera_browser::BrowserError;
use tessera_detector::DetectorError;
use thiserror::Error;

/// Errors that can occur while resolving a challenge.
#[derive(Error, Debug)]
pub enum SolverError {
    /// The full detection cycle was restarted until the configured bound
    /// was reached. Unrecoverable; callers must treat this as an abort.
    #[error("exceeded maximum retry count of {limit}")]
    RetryLimitExceeded {
        /// The configured retry limit
        limit: u32,
    },

    /// The challenge surface resolved into a state the solver cannot act
    /// on (e.g. a frame with an empty prompt).
    #[error("invalid challenge state: {0}")]
    InvalidState(String),

    /// Page automation failure that could not be recovered locally
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Classifier failure
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
}

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, SolverError>;
