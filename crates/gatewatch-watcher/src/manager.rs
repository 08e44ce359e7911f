//! Camera watcher lifecycle management.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use gatewatch_models::{CameraId, Direction, OverlayEvent};
use gatewatch_ptz::{AutoZoom, HttpPtzChannel, PtzConfig, ZoomStatus, ZoomTuning};

use crate::error::{WatcherError, WatcherResult};
use crate::frames::{FrameSource, HttpFrameSource};
use crate::metrics;
use crate::pipeline::{CameraConfig, CameraWatcher, PipelineContext};
use crate::stats::{StatsSnapshot, WatcherStats};

/// Public view of one running camera.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSummary {
    pub camera_id: CameraId,
    pub stream_url: String,
    pub direction: Direction,
    pub connected: bool,
    pub stats: StatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<ZoomStatus>,
}

struct CameraHandle {
    config: CameraConfig,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    frames: Arc<HttpFrameSource>,
    stats: Arc<WatcherStats>,
    overlay: Arc<StdMutex<Vec<OverlayEvent>>>,
    zoom_status: Arc<StdMutex<Option<ZoomStatus>>>,
}

/// Owns every camera watcher task: start, stop, inspect.
pub struct CameraManager {
    ctx: PipelineContext,
    cameras: Mutex<HashMap<CameraId, CameraHandle>>,
}

impl CameraManager {
    /// Create a manager over the shared pipeline collaborators.
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            cameras: Mutex::new(HashMap::new()),
        }
    }

    /// Start watching a camera.
    pub async fn start_camera(&self, config: CameraConfig) -> WatcherResult<()> {
        config
            .tripwire
            .validate()
            .map_err(|e| WatcherError::InvalidConfig(e.to_string()))?;

        let mut cameras = self.cameras.lock().await;
        if let Some(existing) = cameras.get(&config.camera_id) {
            if !existing.task.is_finished() {
                return Err(WatcherError::CameraAlreadyRunning(config.camera_id));
            }
            // A dead watcher (e.g. its frame source gave up) may be replaced.
            cameras.remove(&config.camera_id);
        }

        let zoom = match &config.ptz_url {
            Some(url) => {
                let channel = HttpPtzChannel::new(PtzConfig::new(url.clone()))?;
                Some(AutoZoom::new(Arc::new(channel), ZoomTuning::default()))
            }
            None => None,
        };

        let frames = Arc::new(HttpFrameSource::spawn(
            config.camera_id.clone(),
            config.stream_url.clone(),
            self.ctx.settings.poll_interval,
            self.ctx.settings.frame_retry_backoff,
            self.ctx.settings.frame_max_retries,
        ));

        let (shutdown, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(WatcherStats::default());
        let overlay = Arc::new(StdMutex::new(Vec::new()));
        let zoom_status = Arc::new(StdMutex::new(None));

        let watcher = CameraWatcher::new(
            config.clone(),
            self.ctx.clone(),
            zoom,
            stats.clone(),
            overlay.clone(),
            zoom_status.clone(),
            shutdown_rx,
        );
        let task_frames: Arc<dyn FrameSource> = frames.clone();
        let task = tokio::spawn(watcher.run(task_frames));

        info!(camera = %config.camera_id, "camera started");
        cameras.insert(
            config.camera_id.clone(),
            CameraHandle {
                config,
                shutdown,
                task,
                frames,
                stats,
                overlay,
                zoom_status,
            },
        );
        metrics::set_cameras_active(cameras.len());
        Ok(())
    }

    /// Stop a camera and wait for its loop to wind down.
    pub async fn stop_camera(&self, camera_id: &CameraId) -> WatcherResult<()> {
        let handle = {
            let mut cameras = self.cameras.lock().await;
            let handle = cameras
                .remove(camera_id)
                .ok_or_else(|| WatcherError::CameraNotFound(camera_id.clone()))?;
            metrics::set_cameras_active(cameras.len());
            handle
        };

        let _ = handle.shutdown.send(true);
        handle.frames.stop();

        // The loop finishes its current iteration and resets the zoom
        // motor; give it time for the physical settle before aborting.
        match tokio::time::timeout(Duration::from_secs(10), handle.task).await {
            Ok(_) => info!(camera = %camera_id, "camera stopped"),
            Err(_) => warn!(camera = %camera_id, "camera stop timed out"),
        }
        Ok(())
    }

    /// Stop every camera. Called on service shutdown.
    pub async fn shutdown_all(&self) {
        let ids: Vec<CameraId> = {
            let cameras = self.cameras.lock().await;
            cameras.keys().cloned().collect()
        };
        for id in ids {
            if let Err(e) = self.stop_camera(&id).await {
                warn!(camera = %id, error = %e, "shutdown: stop failed");
            }
        }
    }

    /// Summaries of every registered camera.
    pub async fn list(&self) -> Vec<CameraSummary> {
        let cameras = self.cameras.lock().await;
        cameras
            .values()
            .map(|handle| CameraSummary {
                camera_id: handle.config.camera_id.clone(),
                stream_url: handle.config.stream_url.clone(),
                direction: handle.config.direction,
                connected: handle.frames.connected(),
                stats: handle.stats.snapshot(),
                zoom: handle
                    .zoom_status
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone(),
            })
            .collect()
    }

    /// Latest overlay records for one camera.
    pub async fn overlay(&self, camera_id: &CameraId) -> WatcherResult<Vec<OverlayEvent>> {
        let cameras = self.cameras.lock().await;
        let handle = cameras
            .get(camera_id)
            .ok_or_else(|| WatcherError::CameraNotFound(camera_id.clone()))?;
        let events = handle
            .overlay
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        Ok(events)
    }

    /// Number of registered cameras.
    pub async fn count(&self) -> usize {
        self.cameras.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatcherConfig;
    use crate::pipeline::MockDetector;
    use crate::sink::{MockEventSink, RecentEvents};
    use gatewatch_models::Tripwire;
    use gatewatch_vision::{CooldownGate, CooldownPolicy, SubjectRegistry};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_ctx() -> PipelineContext {
        let mut detector = MockDetector::new();
        detector.expect_detect().returning(|_| {
            Ok(gatewatch_ml_client::DetectResponse {
                frame_width: 700,
                frame_height: 394,
                persons: vec![],
                faces: vec![],
            })
        });
        let mut sink = MockEventSink::new();
        sink.expect_publish().returning(|_| {});
        sink.expect_publish_overlay().returning(|_, _| {});

        let settings = WatcherConfig {
            poll_interval: Duration::from_millis(10),
            frame_retry_backoff: Duration::from_millis(10),
            frame_max_retries: 3,
            ..Default::default()
        };
        PipelineContext {
            settings: settings.clone(),
            detector: Arc::new(detector),
            registry: Arc::new(SubjectRegistry::new(settings.match_tolerance)),
            gate: Arc::new(CooldownGate::new(
                settings.cooldown,
                CooldownPolicy::ClearOtherCameras,
            )),
            sink: Arc::new(sink),
            recent: Arc::new(RecentEvents::default()),
        }
    }

    fn camera(server_uri: &str, id: &str) -> CameraConfig {
        CameraConfig {
            camera_id: CameraId::from_string(id),
            stream_url: server_uri.to_string(),
            tripwire: Tripwire::new(0.1, 0.8, 0.9, 0.8).unwrap(),
            direction: Direction::CheckIn,
            ptz_url: None,
        }
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/shot.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
            .mount(&server)
            .await;

        let manager = CameraManager::new(test_ctx());
        let config = camera(&server.uri(), "cam-1");

        manager.start_camera(config.clone()).await.expect("starts");
        assert_eq!(manager.count().await, 1);

        // Double start is rejected while the watcher lives.
        let err = manager.start_camera(config).await.expect_err("duplicate");
        assert!(matches!(err, WatcherError::CameraAlreadyRunning(_)));

        manager
            .stop_camera(&CameraId::from_string("cam-1"))
            .await
            .expect("stops");
        assert_eq!(manager.count().await, 0);

        // Stopping again reports not-found.
        let err = manager
            .stop_camera(&CameraId::from_string("cam-1"))
            .await
            .expect_err("gone");
        assert!(matches!(err, WatcherError::CameraNotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_tripwire_rejected() {
        let manager = CameraManager::new(test_ctx());
        let mut config = camera("http://cam.invalid", "cam-bad");
        config.tripwire.x2 = 1.5;

        let err = manager.start_camera(config).await.expect_err("invalid");
        assert!(matches!(err, WatcherError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_list_reports_summary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/shot.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
            .mount(&server)
            .await;

        let manager = CameraManager::new(test_ctx());
        manager
            .start_camera(camera(&server.uri(), "cam-list"))
            .await
            .expect("starts");

        let summaries = manager.list().await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].camera_id.as_str(), "cam-list");
        assert!(summaries[0].zoom.is_none());

        manager.shutdown_all().await;
        assert_eq!(manager.count().await, 0);
    }
}
