//! Detection service HTTP client.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, warn};

use gatewatch_models::BoundingBox;

use crate::error::{DetectorError, DetectorResult};
use crate::types::{DetectResponse, HealthResponse, RecognizeResponse};

/// Configuration for the detector client.
#[derive(Debug, Clone)]
pub struct DetectorClientConfig {
    /// Base URL of the detection service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries for retryable failures
    pub max_retries: u32,
}

impl Default for DetectorClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8100".to_string(),
            timeout: Duration::from_secs(20),
            max_retries: 2,
        }
    }
}

impl DetectorClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("DETECT_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8100".to_string()),
            timeout: Duration::from_secs(
                std::env::var("DETECT_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
            ),
            max_retries: std::env::var("DETECT_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}

/// Client for the detection/recognition service.
pub struct DetectorClient {
    http: Client,
    config: DetectorClientConfig,
}

impl DetectorClient {
    /// Create a new detector client.
    pub fn new(config: DetectorClientConfig) -> DetectorResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DetectorError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> DetectorResult<Self> {
        Self::new(DetectorClientConfig::from_env())
    }

    /// Check if the detection service is healthy.
    pub async fn health_check(&self) -> DetectorResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Detection service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Detection service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Detect persons and faces in a JPEG frame.
    pub async fn detect(&self, frame_jpeg: &[u8]) -> DetectorResult<DetectResponse> {
        let url = format!("{}/detect", self.config.base_url);
        debug!(bytes = frame_jpeg.len(), "sending detect request");

        let response = self
            .with_retry(|| async {
                let form = Form::new().part("image", jpeg_part(frame_jpeg));
                self.http
                    .post(&url)
                    .multipart(form)
                    .send()
                    .await
                    .map_err(DetectorError::Network)
            })
            .await?;

        Self::parse_json(response).await
    }

    /// Locate and encode the largest face inside a body region.
    ///
    /// The region is the body box in normalized coordinates; the service
    /// pads it, crops, and runs face detection plus descriptor encoding.
    pub async fn recognize(
        &self,
        frame_jpeg: &[u8],
        body_bbox: &BoundingBox,
    ) -> DetectorResult<RecognizeResponse> {
        let url = format!("{}/recognize", self.config.base_url);
        debug!(bytes = frame_jpeg.len(), "sending recognize request");

        let bbox_json = serde_json::to_string(body_bbox)?;
        let response = self
            .with_retry(|| async {
                let form = Form::new()
                    .part("image", jpeg_part(frame_jpeg))
                    .text("bodyBbox", bbox_json.clone());
                self.http
                    .post(&url)
                    .multipart(form)
                    .send()
                    .await
                    .map_err(DetectorError::Network)
            })
            .await?;

        Self::parse_json(response).await
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> DetectorResult<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DetectorError::RequestFailed(format!(
                "detection service returned {}: {}",
                status, body
            )));
        }
        Ok(response.json().await?)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> DetectorResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = DetectorResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(250 * 2u64.pow(attempt));
                    warn!(
                        "Detect request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| DetectorError::RequestFailed("Unknown error".to_string())))
    }
}

fn jpeg_part(bytes: &[u8]) -> Part {
    Part::bytes(bytes.to_vec())
        .file_name("frame.jpg")
        .mime_str("image/jpeg")
        .unwrap_or_else(|_| Part::bytes(bytes.to_vec()).file_name("frame.jpg"))
}
