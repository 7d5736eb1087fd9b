use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("frame not found: {0}")]
    FrameNotFound(String),

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

impl BrowserError {
    /// Whether this error is a wait/click timeout, as opposed to a harder
    /// protocol or navigation failure.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
