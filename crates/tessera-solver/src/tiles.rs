//! One classifier pass over the tile grid: screenshot, detect, click.

use crate::error::Result;
use std::time::Duration;
use tessera_browser::PageHandle;
use tessera_detector::TileClassifier;

/// Outcome of one detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilePass {
    /// Matching tiles were clicked; the cycle may move on
    Proceed,

    /// Verify-mode pass found nothing to click: the challenge has not
    /// passed yet, but that is for the caller to act on
    NotYet,

    /// Non-verify pass found nothing: this read is unrecoverable for the
    /// current cycle and the whole cycle must be restarted
    RetryCycle,
}

/// Run one detection pass.
///
/// Captures a full-viewport screenshot, asks the classifier for matches,
/// and clicks every reported coordinate, pacing clicks by `click_interval`
/// when one is configured. In verify mode an empty detection is a
/// [`TilePass::NotYet`] signal rather than a cycle restart.
pub async fn run_detection(
    page: &dyn PageHandle,
    classifier: &dyn TileClassifier,
    prompt: &str,
    area_grid: bool,
    verify: bool,
    click_interval: Option<Duration>,
) -> Result<TilePass> {
    let image = page.screenshot().await?;
    let detection = classifier.detect(prompt, &image, area_grid).await?;

    if !detection.has_matches() {
        if verify {
            return Ok(TilePass::NotYet);
        }
        tracing::error!("detector returned no results for prompt '{}'", prompt);
        return Ok(TilePass::RetryCycle);
    }

    for (x, y) in &detection.coordinates {
        page.click_point(*x, *y).await?;
        if let Some(delay) = click_interval {
            tokio::time::sleep(delay).await;
        }
    }

    Ok(TilePass::Proceed)
}
