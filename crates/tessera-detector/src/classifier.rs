//! Core tile classifier trait and detection result type.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of one classifier invocation.
///
/// `matches` carries one flag per recognized candidate tile; `coordinates`
/// carries the viewport points to click for every positive match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Detection {
    /// Per-candidate match flags
    pub matches: Vec<bool>,
    /// Click coordinates for positive matches, in viewport pixels
    pub coordinates: Vec<(f64, f64)>,
}

impl Detection {
    /// An empty detection: nothing matched, nothing to click.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether any candidate matched.
    #[must_use]
    pub fn has_matches(&self) -> bool {
        self.matches.iter().any(|m| *m)
    }
}

/// Trait for image-tile classifiers.
///
/// The classifier is an opaque collaborator: it receives the challenge
/// prompt and a full-page screenshot and reports which tiles match and
/// where to click. Implementations must be thread-safe (Send + Sync)
/// for use in async contexts.
#[async_trait]
pub trait TileClassifier: Send + Sync {
    /// Classify the tiles on a challenge screenshot.
    ///
    /// `area_grid` hints that the challenge is a 4x4 area grid rather
    /// than a 3x3 tile grid, which changes how the classifier segments
    /// the image.
    ///
    /// # Errors
    /// Returns error if the classifier backend fails or its response
    /// cannot be interpreted.
    async fn detect(&self, prompt: &str, image: &[u8], area_grid: bool) -> Result<Detection>;
}
