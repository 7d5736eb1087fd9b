//! Page-automation seam consumed by the challenge solver.
//!
//! The solver never talks to a browser directly; it works against these
//! traits so the underlying automation backend stays swappable and the
//! decision logic stays testable with scripted handles.

use crate::error::{BrowserError, Result};
use std::time::Duration;

/// A response the page observed on the network, reduced to what the
/// challenge observer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEvent {
    /// Full request URL
    pub url: String,
    /// Response body as text
    pub body: String,
}

/// Handle to an automated browser page.
#[async_trait::async_trait]
pub trait PageHandle: Send + Sync {
    /// Resolve an embedded frame by the selector of its `<iframe>` element.
    ///
    /// # Errors
    /// Returns [`crate::BrowserError::FrameNotFound`] if no such iframe is
    /// attached to the document.
    async fn frame(&self, selector: &str) -> Result<Box<dyn FrameHandle>>;

    /// Evaluate a JavaScript expression in the page and return its value.
    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value>;

    /// Take a full-viewport screenshot, returned as encoded image bytes.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Dispatch a mouse click at viewport coordinates.
    async fn click_point(&self, x: f64, y: f64) -> Result<()>;
}

/// Handle to an embedded frame, scoping element operations to its document.
#[async_trait::async_trait]
pub trait FrameHandle: Send + Sync {
    /// Wait until an element matching the selector is visible.
    ///
    /// # Errors
    /// Returns [`crate::BrowserError::Timeout`] if the element never
    /// becomes visible within the timeout.
    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Click the first element matching the selector, waiting up to the
    /// timeout for it to appear.
    async fn click(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Text content of the first element matching the selector.
    ///
    /// Returns `Ok(None)` when the element exists but has no text.
    async fn text_content(&self, selector: &str) -> Result<Option<String>>;

    /// Number of elements currently matching the selector.
    async fn count(&self, selector: &str) -> Result<usize>;
}

/// Helper to extract the host from a URL.
pub fn extract_domain(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {e}")))?;

    url.host_str()
        .ok_or_else(|| BrowserError::NavigationError("No host in URL".to_string()))
        .map(ToString::to_string)
}
