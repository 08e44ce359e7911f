//! Latest-frame-only acquisition.
//!
//! A background task polls the camera's snapshot endpoint and keeps only
//! the newest JPEG. Readers take the frame (freshness over completeness:
//! older frames are dropped, never queued), so the pipeline always works
//! on the most recent view and never blocks on the network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use gatewatch_models::CameraId;

/// One decoded-enough frame: raw JPEG bytes plus fetch time.
#[derive(Debug, Clone)]
pub struct Frame {
    /// JPEG bytes as served by the camera
    pub jpeg: Vec<u8>,
    /// When the frame was fetched
    pub fetched_at: Instant,
}

/// Source of the most recent camera frame.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Take the newest frame, if one arrived since the last call.
    async fn latest(&self) -> Option<Frame>;

    /// Whether the source currently reaches the camera.
    fn connected(&self) -> bool;

    /// Whether the source has permanently stopped.
    fn stopped(&self) -> bool;
}

/// HTTP snapshot poller.
///
/// Polls `<url>/shot.jpg` (or the URL itself when it already points at a
/// JPEG) with bounded retries and backoff; gives up for good after
/// `max_retries` consecutive failures.
pub struct HttpFrameSource {
    slot: Arc<Mutex<Option<Frame>>>,
    connected: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
}

impl HttpFrameSource {
    /// Spawn the poll task for one camera.
    pub fn spawn(
        camera_id: CameraId,
        stream_url: String,
        poll_interval: Duration,
        retry_backoff: Duration,
        max_retries: u32,
    ) -> Self {
        let slot = Arc::new(Mutex::new(None));
        let connected = Arc::new(AtomicBool::new(false));
        let stopped = Arc::new(AtomicBool::new(false));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task_slot = slot.clone();
        let task_connected = connected.clone();
        let task_stopped = stopped.clone();
        tokio::spawn(async move {
            poll_loop(
                camera_id,
                stream_url,
                poll_interval,
                retry_backoff,
                max_retries,
                task_slot,
                task_connected,
                shutdown_rx,
            )
            .await;
            task_stopped.store(true, Ordering::Relaxed);
        });

        Self {
            slot,
            connected,
            stopped,
            shutdown,
        }
    }

    /// Stop the poll task.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for HttpFrameSource {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

#[async_trait]
impl FrameSource for HttpFrameSource {
    async fn latest(&self) -> Option<Frame> {
        self.slot.lock().await.take()
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

fn snapshot_url(stream_url: &str) -> String {
    let trimmed = stream_url.trim_end_matches('/');
    if trimmed.ends_with(".jpg") || trimmed.ends_with(".jpeg") {
        trimmed.to_string()
    } else {
        format!("{}/shot.jpg", trimmed)
    }
}

#[allow(clippy::too_many_arguments)]
async fn poll_loop(
    camera_id: CameraId,
    stream_url: String,
    poll_interval: Duration,
    retry_backoff: Duration,
    max_retries: u32,
    slot: Arc<Mutex<Option<Frame>>>,
    connected: Arc<AtomicBool>,
    shutdown: watch::Receiver<bool>,
) {
    let url = snapshot_url(&stream_url);
    info!(camera = %camera_id, url = %url, "frame grabber starting");

    let http = match Client::builder().timeout(Duration::from_secs(5)).build() {
        Ok(c) => c,
        Err(e) => {
            error!(camera = %camera_id, error = %e, "frame grabber failed to build client");
            return;
        }
    };

    let mut retry_count = 0u32;

    while !*shutdown.borrow() {
        match http.get(&url).send().await {
            Ok(response) if response.status().is_success() => match response.bytes().await {
                Ok(bytes) if !bytes.is_empty() => {
                    retry_count = 0;
                    if !connected.swap(true, Ordering::Relaxed) {
                        info!(camera = %camera_id, bytes = bytes.len(), "frame grabber connected");
                    }
                    let frame = Frame {
                        jpeg: bytes.to_vec(),
                        fetched_at: Instant::now(),
                    };
                    *slot.lock().await = Some(frame);
                    tokio::time::sleep(poll_interval).await;
                }
                _ => {
                    retry_count += 1;
                    connected.store(false, Ordering::Relaxed);
                    if retry_count >= max_retries {
                        break;
                    }
                    tokio::time::sleep(retry_backoff).await;
                }
            },
            Ok(response) => {
                debug!(camera = %camera_id, status = %response.status(), "snapshot request rejected");
                retry_count += 1;
                connected.store(false, Ordering::Relaxed);
                if retry_count >= max_retries {
                    break;
                }
                tokio::time::sleep(retry_backoff).await;
            }
            Err(e) => {
                warn!(camera = %camera_id, error = %e, "snapshot request failed");
                retry_count += 1;
                connected.store(false, Ordering::Relaxed);
                if retry_count >= max_retries {
                    break;
                }
                tokio::time::sleep(retry_backoff).await;
            }
        }
    }

    connected.store(false, Ordering::Relaxed);
    if retry_count >= max_retries {
        error!(camera = %camera_id, retries = retry_count, "frame grabber giving up");
    } else {
        info!(camera = %camera_id, "frame grabber stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_snapshot_url_shapes() {
        assert_eq!(
            snapshot_url("http://cam.local:8080"),
            "http://cam.local:8080/shot.jpg"
        );
        assert_eq!(
            snapshot_url("http://cam.local:8080/"),
            "http://cam.local:8080/shot.jpg"
        );
        assert_eq!(
            snapshot_url("http://cam.local/still.jpg"),
            "http://cam.local/still.jpg"
        );
    }

    #[tokio::test]
    async fn test_latest_takes_frame_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/shot.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpegjpeg".to_vec()))
            .mount(&server)
            .await;

        let source = HttpFrameSource::spawn(
            CameraId::from_string("cam-test"),
            server.uri(),
            Duration::from_millis(20),
            Duration::from_millis(20),
            3,
        );

        // Wait for the poller to land a frame.
        let mut frame = None;
        for _ in 0..50 {
            if let Some(f) = source.latest().await {
                frame = Some(f);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let frame = frame.expect("poller should deliver a frame");
        assert_eq!(frame.jpeg, b"jpegjpeg");
        assert!(source.connected());

        source.stop();
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/shot.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpFrameSource::spawn(
            CameraId::from_string("cam-dead"),
            server.uri(),
            Duration::from_millis(5),
            Duration::from_millis(5),
            2,
        );

        for _ in 0..100 {
            if source.stopped() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(source.stopped());
        assert!(!source.connected());
        assert!(source.latest().await.is_none());
    }
}
