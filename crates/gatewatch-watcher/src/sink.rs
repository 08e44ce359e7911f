//! Outbound event publishing.
//!
//! Attendance and overlay pushes are fire-and-forget: failures are
//! logged, never retried inline, and never block the camera loop.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use gatewatch_models::{AttendanceEvent, CameraId, OverlayEvent};

/// Destination for pipeline events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish an attendance event.
    async fn publish(&self, event: AttendanceEvent);

    /// Publish the current overlay records for a camera.
    async fn publish_overlay(&self, camera: &CameraId, events: Vec<OverlayEvent>);
}

/// HTTP sink posting to the upstream API.
pub struct HttpEventSink {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpEventSink {
    /// Create a sink for the given API base URL.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn request(&self, url: String, body: serde_json::Value) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .post(url)
            .header("x-attendance-sync", "true")
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key.clone());
        }
        req
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn publish(&self, event: AttendanceEvent) {
        let url = format!("{}/api/attendance/event", self.base_url);
        let body = match serde_json::to_value(&event) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to serialize attendance event");
                return;
            }
        };

        info!(
            subject = %event.subject_id,
            camera = %event.camera_id,
            direction = event.direction.as_str(),
            confidence = event.confidence,
            "attendance event"
        );

        // Detach the push so a slow API never stalls the camera loop.
        let request = self.request(url, body);
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    warn!(%status, body = %text.chars().take(200).collect::<String>(),
                        "attendance push rejected");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "attendance push failed"),
            }
        });
    }

    async fn publish_overlay(&self, camera: &CameraId, events: Vec<OverlayEvent>) {
        let url = format!("{}/api/line-crossing/events", self.base_url);
        let body = json!({ "cameraId": camera, "events": events });

        let request = self.request(url, body);
        tokio::spawn(async move {
            if let Err(e) = request.send().await {
                debug!(error = %e, "overlay push failed");
            }
        });
    }
}

/// Ring buffer of recently published attendance events, for the status
/// endpoint.
pub struct RecentEvents {
    cap: usize,
    events: Mutex<VecDeque<AttendanceEvent>>,
}

impl RecentEvents {
    /// Create a buffer holding at most `cap` events.
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Append an event, evicting the oldest past capacity.
    pub fn push(&self, event: AttendanceEvent) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if events.len() == self.cap {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Newest-last copy of the buffer.
    pub fn snapshot(&self) -> Vec<AttendanceEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecentEvents {
    fn default() -> Self {
        Self::new(100)
    }
}
