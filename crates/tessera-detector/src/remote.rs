//! HTTP client for a remote tile-classification service.

use crate::classifier::{Detection, TileClassifier};
use crate::error::{DetectorError, Result};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tessera_core::DetectorConfig;

/// Remote tile classifier.
///
/// Posts the prompt and screenshot to an external classification service
/// and maps its answer onto [`Detection`].
pub struct RemoteClassifier {
    client: Client,
    endpoint: String,
}

impl RemoteClassifier {
    /// Create a classifier client from settings.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        Self::with_endpoint(&config.endpoint, config.timeout_secs)
    }

    /// Create a classifier client with an explicit endpoint and timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn with_endpoint(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DetectorError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn to_api_request(prompt: &str, image: &[u8], area_grid: bool) -> DetectRequest {
        DetectRequest {
            prompt: prompt.to_string(),
            image: base64::engine::general_purpose::STANDARD.encode(image),
            area_grid,
        }
    }

    fn convert_api_response(response: DetectResponse) -> Result<Detection> {
        let positives = response.matches.iter().filter(|m| **m).count();
        if positives > 0 && response.coordinates.is_empty() {
            return Err(DetectorError::Inconsistent {
                reason: format!("{positives} matches, 0 coordinates"),
            });
        }

        Ok(Detection {
            matches: response.matches,
            coordinates: response.coordinates,
        })
    }
}

#[async_trait]
impl TileClassifier for RemoteClassifier {
    async fn detect(&self, prompt: &str, image: &[u8], area_grid: bool) -> Result<Detection> {
        let request = Self::to_api_request(prompt, image, area_grid);
        tracing::debug!(
            "classifying {} byte screenshot for prompt '{}'",
            image.len(),
            prompt
        );

        let response = self
            .client
            .post(format!("{}/detect", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| DetectorError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DetectorError::Http(format!(
                "classifier returned status {}",
                response.status()
            )));
        }

        let api_response: DetectResponse = response
            .json()
            .await
            .map_err(|e| DetectorError::InvalidResponse(e.to_string()))?;

        Self::convert_api_response(api_response)
    }
}

/// Wire format of a classification request.
#[derive(Debug, Serialize)]
struct DetectRequest {
    prompt: String,
    image: String,
    area_grid: bool,
}

/// Wire format of a classification response.
#[derive(Debug, Deserialize)]
struct DetectResponse {
    matches: Vec<bool>,
    #[serde(default)]
    coordinates: Vec<(f64, f64)>,
}
