use crate::error::{BrowserError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use tessera_core::BrowserConfig as BrowserSettings;

/// Browser automation engine.
///
/// Owns the chromium process and hands out pages. The challenge solver only
/// ever sees [`crate::PageHandle`] objects produced from these pages.
pub struct BrowserEngine {
    browser: Browser,
}

impl BrowserEngine {
    /// Launch a browser with default settings.
    pub async fn new() -> Result<Self> {
        Self::with_settings(&BrowserSettings::default()).await
    }

    /// Launch a browser with the given settings.
    pub async fn with_settings(settings: &BrowserSettings) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(settings.window_width, settings.window_height);
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // The handler must be polled for the CDP connection to make progress.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {}", e);
                }
            }
        });

        Ok(Self { browser })
    }

    /// Open a new page and navigate it to the given URL.
    pub async fn open_page(&self, url: &str) -> Result<Page> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| BrowserError::NavigationError(e.to_string()))?;
        Ok(page)
    }
}
