//! Chromium-backed implementations of the page-automation seam.
//!
//! [`CdpPage`] adapts a chromiumoxide [`Page`] to [`PageHandle`].
//! Frame-scoped operations go through `contentDocument` script evaluation,
//! which keeps this adapter a thin mapping onto the devtools protocol;
//! element primitives themselves are not this crate's concern.

use crate::error::{BrowserError, Result};
use crate::handle::{FrameHandle, PageHandle, ResponseEvent};
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, GetResponseBodyParams,
};
use chromiumoxide::layout::Point;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Poll interval for frame-scoped wait/click operations.
const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Quote a string as a JavaScript string literal.
fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// [`PageHandle`] over a chromiumoxide page.
#[derive(Clone)]
pub struct CdpPage {
    page: Page,
}

impl CdpPage {
    /// Wrap a chromiumoxide page.
    #[must_use]
    pub fn new(page: Page) -> Self {
        Self { page }
    }
}

#[async_trait::async_trait]
impl PageHandle for CdpPage {
    async fn frame(&self, selector: &str) -> Result<Box<dyn FrameHandle>> {
        let expr = format!(
            "(() => document.querySelector({sel}) !== null)()",
            sel = js_str(selector)
        );
        let attached = self.evaluate(&expr).await?;
        if attached.as_bool() != Some(true) {
            return Err(BrowserError::FrameNotFound(selector.to_string()));
        }
        Ok(Box::new(CdpFrame {
            page: self.page.clone(),
            frame_selector: selector.to_string(),
        }))
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| BrowserError::Evaluation(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn click_point(&self, x: f64, y: f64) -> Result<()> {
        self.page
            .click(Point::new(x, y))
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(())
    }
}

/// [`FrameHandle`] scoping element operations to an iframe's document.
pub struct CdpFrame {
    page: Page,
    frame_selector: String,
}

impl CdpFrame {
    /// Build an expression operating on the frame's document. `body` sees
    /// the document bound as `doc`; a detached or cross-process frame
    /// evaluates to `undefined` and is reported as [`BrowserError::FrameNotFound`].
    fn frame_expr(&self, body: &str) -> String {
        format!(
            "(() => {{ const f = document.querySelector({frame}); \
             const doc = f && f.contentDocument; if (!doc) return undefined; {body} }})()",
            frame = js_str(&self.frame_selector),
            body = body
        )
    }

    async fn eval_in_frame(&self, body: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(self.frame_expr(body))
            .await
            .map_err(|e| BrowserError::Evaluation(e.to_string()))?;
        match result.value() {
            Some(value) => Ok(value.clone()),
            None => Err(BrowserError::FrameNotFound(self.frame_selector.clone())),
        }
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let body = format!(
            "const el = doc.querySelector({sel}); if (!el) return false; \
             const r = el.getBoundingClientRect(); return r.width > 0 && r.height > 0;",
            sel = js_str(selector)
        );
        Ok(self.eval_in_frame(&body).await?.as_bool() == Some(true))
    }

    async fn try_click(&self, selector: &str) -> Result<bool> {
        let body = format!(
            "const el = doc.querySelector({sel}); if (!el) return false; \
             el.click(); return true;",
            sel = js_str(selector)
        );
        Ok(self.eval_in_frame(&body).await?.as_bool() == Some(true))
    }
}

#[async_trait::async_trait]
impl FrameHandle for CdpFrame {
    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_visible(selector).await.unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(selector.to_string()));
            }
            tokio::time::sleep(ELEMENT_POLL_INTERVAL).await;
        }
    }

    async fn click(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_click(selector).await.unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(selector.to_string()));
            }
            tokio::time::sleep(ELEMENT_POLL_INTERVAL).await;
        }
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>> {
        let body = format!(
            "const el = doc.querySelector({sel}); return el ? el.textContent : null;",
            sel = js_str(selector)
        );
        let value = self.eval_in_frame(&body).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let body = format!(
            "return doc.querySelectorAll({sel}).length;",
            sel = js_str(selector)
        );
        let value = self.eval_in_frame(&body).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }
}

/// Forward the page's network responses into a channel.
///
/// Subscribes to `Network.responseReceived` and, for URLs accepted by
/// `interest`, fetches the response body and emits a [`ResponseEvent`].
/// Body retrieval is best-effort: bodies that are gone by the time they
/// are requested (navigation, eviction) are logged at debug level and
/// skipped. The forwarder never propagates an error to the page.
pub async fn spawn_response_forwarder<F>(
    page: &Page,
    tx: UnboundedSender<ResponseEvent>,
    interest: F,
) -> Result<JoinHandle<()>>
where
    F: Fn(&str) -> bool + Send + 'static,
{
    page.execute(EnableParams::default())
        .await
        .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

    let mut events = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

    let page = page.clone();
    let handle = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let url = event.response.url.clone();
            if !interest(&url) {
                continue;
            }

            let body = match page
                .execute(GetResponseBodyParams::new(event.request_id.clone()))
                .await
            {
                Ok(response) => {
                    let returns = &response.result;
                    if returns.base64_encoded {
                        match base64::engine::general_purpose::STANDARD.decode(&returns.body) {
                            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                            Err(e) => {
                                tracing::debug!("undecodable response body for {}: {}", url, e);
                                continue;
                            }
                        }
                    } else {
                        returns.body.clone()
                    }
                }
                Err(e) => {
                    tracing::debug!("response body unavailable for {}: {}", url, e);
                    continue;
                }
            };

            if tx.send(ResponseEvent { url, body }).is_err() {
                break;
            }
        }
    });

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_str_quoting() {
        assert_eq!(js_str("strong"), "\"strong\"");
        assert_eq!(js_str("iframe[src*='bframe']"), "\"iframe[src*='bframe']\"");
        // Embedded quotes must not break out of the literal
        assert_eq!(js_str("a\"b"), "\"a\\\"b\"");
    }
}
