//! Watcher configuration.

use std::time::Duration;

/// Pipeline configuration shared by every camera watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Target interval between processed frames (~3 fps)
    pub poll_interval: Duration,
    /// Wait between frame-source reconnect attempts
    pub frame_retry_backoff: Duration,
    /// Consecutive frame-source failures before giving up
    pub frame_max_retries: u32,
    /// Per (subject, camera) attendance cooldown
    pub cooldown: Duration,
    /// Whether marking a camera clears the subject's other-camera cooldowns
    pub cooldown_clears_other_cameras: bool,
    /// Face descriptor match tolerance (lower = stricter)
    pub match_tolerance: f64,
    /// Frames a track survives without a detection
    pub max_disappeared: u32,
    /// Max centroid distance (normalized) for track matching
    pub max_distance: f64,
    /// How long a recognition label stays on the overlay
    pub recognition_display: Duration,
    /// Cadence of auto-zoom updates
    pub zoom_update_interval: Duration,
    /// Base URL of the upstream API receiving events
    pub api_base_url: String,
    /// API key sent with event pushes
    pub api_key: Option<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(300),
            frame_retry_backoff: Duration::from_secs(5),
            frame_max_retries: 10,
            cooldown: Duration::from_secs(120),
            cooldown_clears_other_cameras: true,
            match_tolerance: 0.55,
            max_disappeared: 30,
            max_distance: 0.35,
            recognition_display: Duration::from_secs(5),
            zoom_update_interval: Duration::from_secs(1),
            api_base_url: "http://localhost:3000".to_string(),
            api_key: None,
        }
    }
}

impl WatcherConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: Duration::from_millis(
                std::env::var("POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            frame_retry_backoff: Duration::from_secs(
                std::env::var("FRAME_RETRY_BACKOFF_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            frame_max_retries: std::env::var("FRAME_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            cooldown: Duration::from_secs(
                std::env::var("COOLDOWN_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            cooldown_clears_other_cameras: std::env::var("COOLDOWN_CLEAR_CROSS_CAMERA")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            match_tolerance: std::env::var("MATCH_TOLERANCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.55),
            max_disappeared: std::env::var("TRACKER_MAX_DISAPPEARED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            max_distance: std::env::var("TRACKER_MAX_DISTANCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.35),
            recognition_display: defaults.recognition_display,
            zoom_update_interval: defaults.zoom_update_interval,
            api_base_url: std::env::var("CAM_API_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            api_key: std::env::var("CAM_API_KEY").ok().filter(|s| !s.is_empty()),
        }
    }
}
