//! PTZ HTTP command channel.
//!
//! Speaks the zoom subset of the camera's PTZ HTTP API:
//!
//! ```text
//! PUT /PTZ/{channel}/ZoomIn   body: Param1=1&Param2={speed}  (start)
//! PUT /PTZ/{channel}/ZoomOut  body: Param1=0&Param2=0        (stop)
//! ```
//!
//! with HTTP Basic auth. Command failures are logged and surface as
//! `false`; they never propagate, so the zoom state machine retries
//! naturally on its next update.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PtzError, PtzResult};

/// Zoom motor direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomDirection {
    In,
    Out,
}

impl ZoomDirection {
    pub(crate) fn action(&self) -> &'static str {
        match self {
            ZoomDirection::In => "ZoomIn",
            ZoomDirection::Out => "ZoomOut",
        }
    }
}

/// The zoom command channel to a physical camera.
///
/// Implementations must be non-throwing: a failed command returns `false`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PtzChannel: Send + Sync {
    /// Start the zoom motor. Speed is 1 (slow) to 7 (fast).
    async fn start_zoom(&self, direction: ZoomDirection, speed: u8) -> bool;

    /// Stop the zoom motor.
    async fn stop_zoom(&self, direction: ZoomDirection) -> bool;

    /// Whether the last command reached the camera.
    fn connected(&self) -> bool {
        true
    }
}

/// PTZ connection configuration.
#[derive(Debug, Clone)]
pub struct PtzConfig {
    /// Camera HTTP base URL
    pub base_url: String,
    /// PTZ channel number
    pub channel: u32,
    /// Basic auth user
    pub user: String,
    /// Basic auth password (often empty on these cameras)
    pub password: String,
    /// Per-command timeout
    pub timeout: Duration,
}

impl PtzConfig {
    /// Config for a camera URL with the conventional defaults.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            channel: 1,
            user: "admin".to_string(),
            password: String::new(),
            timeout: Duration::from_secs(3),
        }
    }
}

/// HTTP implementation of the PTZ command channel.
pub struct HttpPtzChannel {
    http: Client,
    config: PtzConfig,
    connected: AtomicBool,
}

impl HttpPtzChannel {
    /// Create a channel for one camera.
    pub fn new(config: PtzConfig) -> PtzResult<Self> {
        if config.base_url.is_empty() {
            return Err(PtzError::Config("empty camera URL".to_string()));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(PtzError::Network)?;

        Ok(Self {
            http,
            config,
            connected: AtomicBool::new(false),
        })
    }

    /// Quick connectivity test: start a slow zoom-in and stop it again.
    pub async fn probe(&self) -> bool {
        if self.command(ZoomDirection::In, true, 1).await {
            self.command(ZoomDirection::In, false, 0).await;
            true
        } else {
            false
        }
    }

    async fn command(&self, direction: ZoomDirection, start: bool, speed: u8) -> bool {
        let url = format!(
            "{}/PTZ/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.channel,
            direction.action()
        );
        let (p1, p2) = if start { (1, speed) } else { (0, 0) };
        let body = format!("Param1={}&Param2={}", p1, p2);

        let result = self
            .http
            .put(&url)
            .basic_auth(&self.config.user, Some(&self.config.password))
            .header("If-Modified-Since", "0")
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                if !self.connected.swap(true, Ordering::Relaxed) {
                    info!(url = %self.config.base_url, "PTZ connected");
                }
                true
            }
            Ok(response) => {
                warn!(
                    action = direction.action(),
                    status = %response.status(),
                    "PTZ command rejected"
                );
                false
            }
            Err(e) => {
                self.connected.store(false, Ordering::Relaxed);
                warn!(action = direction.action(), error = %e, "PTZ command error");
                false
            }
        }
    }
}

#[async_trait]
impl PtzChannel for HttpPtzChannel {
    async fn start_zoom(&self, direction: ZoomDirection, speed: u8) -> bool {
        self.command(direction, true, speed.clamp(1, 7)).await
    }

    async fn stop_zoom(&self, direction: ZoomDirection) -> bool {
        self.command(direction, false, 0).await
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_url() {
        assert!(HttpPtzChannel::new(PtzConfig::new("")).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = PtzConfig::new("http://192.168.1.55");
        assert_eq!(config.channel, 1);
        assert_eq!(config.user, "admin");
        assert!(config.password.is_empty());
    }

    #[test]
    fn test_direction_actions() {
        assert_eq!(ZoomDirection::In.action(), "ZoomIn");
        assert_eq!(ZoomDirection::Out.action(), "ZoomOut");
    }
}
