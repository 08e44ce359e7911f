//! The per-camera analytics loop.
//!
//! Frame -> body detection -> centroid tracking -> tripwire crossing ->
//! face recognition -> cooldown gate -> event push. One loop per camera,
//! frames strictly in arrival order, and every network failure degrades
//! to "no effect this cycle".

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use gatewatch_ml_client::{DetectResponse, DetectorClient, DetectorResult, RecognizeResponse};
use gatewatch_models::{
    AttendanceEvent, BoundingBox, CameraId, Direction, OverlayEvent, TrackId, Tripwire,
};
use gatewatch_ptz::{AutoZoom, ZoomStatus};
use gatewatch_vision::{
    CentroidTracker, CooldownGate, CrossingEngine, RecognitionCache, SubjectRegistry,
    TrackerConfig,
};

use crate::config::WatcherConfig;
use crate::frames::{Frame, FrameSource};
use crate::metrics;
use crate::sink::{EventSink, RecentEvents};
use crate::stats::WatcherStats;

/// Detection/recognition backend seam.
///
/// `DetectorClient` is the production implementation; tests substitute a
/// mock so pipeline logic runs without a service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, frame_jpeg: &[u8]) -> DetectorResult<DetectResponse>;

    async fn recognize(
        &self,
        frame_jpeg: &[u8],
        body_bbox: &BoundingBox,
    ) -> DetectorResult<RecognizeResponse>;
}

#[async_trait]
impl Detector for DetectorClient {
    async fn detect(&self, frame_jpeg: &[u8]) -> DetectorResult<DetectResponse> {
        DetectorClient::detect(self, frame_jpeg).await
    }

    async fn recognize(
        &self,
        frame_jpeg: &[u8],
        body_bbox: &BoundingBox,
    ) -> DetectorResult<RecognizeResponse> {
        DetectorClient::recognize(self, frame_jpeg, body_bbox).await
    }
}

/// Static configuration of one watched camera.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    /// Camera identifier
    pub camera_id: CameraId,
    /// Snapshot/stream URL
    pub stream_url: String,
    /// Tripwire to watch
    pub tripwire: Tripwire,
    /// Attendance meaning of a crossing on this camera
    pub direction: Direction,
    /// Camera HTTP base URL for PTZ auto-zoom, when the camera has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ptz_url: Option<String>,
}

/// Shared collaborators handed to every camera watcher.
#[derive(Clone)]
pub struct PipelineContext {
    pub settings: WatcherConfig,
    pub detector: Arc<dyn Detector>,
    pub registry: Arc<SubjectRegistry>,
    pub gate: Arc<CooldownGate>,
    pub sink: Arc<dyn EventSink>,
    pub recent: Arc<RecentEvents>,
}

/// One camera's pipeline state and loop.
pub struct CameraWatcher {
    config: CameraConfig,
    ctx: PipelineContext,
    tracker: CentroidTracker,
    engine: CrossingEngine,
    cache: RecognitionCache,
    zoom: Option<AutoZoom>,
    last_zoom_tick: Option<Instant>,
    stats: Arc<WatcherStats>,
    overlay: Arc<Mutex<Vec<OverlayEvent>>>,
    zoom_status: Arc<Mutex<Option<ZoomStatus>>>,
    had_events: bool,
    shutdown: watch::Receiver<bool>,
}

impl CameraWatcher {
    /// Build a watcher for one camera.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: CameraConfig,
        ctx: PipelineContext,
        zoom: Option<AutoZoom>,
        stats: Arc<WatcherStats>,
        overlay: Arc<Mutex<Vec<OverlayEvent>>>,
        zoom_status: Arc<Mutex<Option<ZoomStatus>>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let tracker = CentroidTracker::new(TrackerConfig {
            max_disappeared: ctx.settings.max_disappeared,
            max_distance: ctx.settings.max_distance,
        });
        let engine = CrossingEngine::new(config.tripwire);
        let cache = RecognitionCache::new(ctx.settings.recognition_display);

        Self {
            config,
            ctx,
            tracker,
            engine,
            cache,
            zoom,
            last_zoom_tick: None,
            stats,
            overlay,
            zoom_status,
            had_events: false,
            shutdown,
        }
    }

    /// Run the camera loop until the stop flag is set or the frame source
    /// dies.
    pub async fn run(mut self, frames: Arc<dyn FrameSource>) {
        info!(
            camera = %self.config.camera_id,
            url = %self.config.stream_url,
            direction = self.config.direction.as_str(),
            "starting camera watcher"
        );
        info!(
            camera = %self.config.camera_id,
            x1 = self.config.tripwire.x1,
            y1 = self.config.tripwire.y1,
            x2 = self.config.tripwire.x2,
            y2 = self.config.tripwire.y2,
            "tripwire configured"
        );

        // Physical settle to wide angle, once per session.
        if let Some(zoom) = self.zoom.as_mut() {
            zoom.start().await;
        }

        let poll = self.ctx.settings.poll_interval;
        let mut first_frame = false;

        while !*self.shutdown.borrow() {
            let Some(frame) = frames.latest().await else {
                if frames.stopped() {
                    warn!(camera = %self.config.camera_id, "frame source died, stopping watcher");
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            };

            if !first_frame {
                first_frame = true;
                info!(camera = %self.config.camera_id, bytes = frame.jpeg.len(), "first frame");
            }

            let t0 = Instant::now();
            self.process_frame(&frame).await;

            let elapsed = t0.elapsed();
            let fps = 1.0 / (elapsed + poll).as_secs_f64().max(0.001);
            self.stats.set_fps(fps);

            if elapsed < poll {
                tokio::time::sleep(poll - elapsed).await;
            }
        }

        // Leave the motor in a neutral state on the way out.
        if let Some(zoom) = self.zoom.as_mut() {
            zoom.reset().await;
        }
        info!(camera = %self.config.camera_id, "camera watcher stopped");
    }

    /// Process one frame through the full pipeline.
    pub(crate) async fn process_frame(&mut self, frame: &Frame) {
        let detection = match self.ctx.detector.detect(&frame.jpeg).await {
            Ok(d) => d,
            Err(e) => {
                warn!(camera = %self.config.camera_id, error = %e, "detection failed");
                return;
            }
        };

        let bodies: Vec<BoundingBox> = detection.persons.iter().map(|p| p.bbox).collect();
        self.stats.set_bodies(bodies.len() as u64);
        metrics::record_bodies(self.config.camera_id.as_str(), bodies.len());

        let tracked = self.tracker.update(&bodies);

        // Side state for dead tracks must go every frame.
        let live: Vec<_> = self.tracker.live_ids().collect();
        self.engine.retain_tracks(|id| live.contains(&id));
        self.cache.purge_expired();

        self.maybe_update_zoom(&detection).await;

        let mut overlay_events = Vec::new();

        for (track_id, info) in &tracked {
            if let Some(crossing) = self.engine.observe(*track_id, &info.bbox) {
                debug!(
                    camera = %self.config.camera_id,
                    track = %track_id,
                    s_init = crossing.side_before,
                    s_curr = crossing.side_after,
                    "handling crossing"
                );
                self.stats.add_crossing();
                metrics::record_crossing(self.config.camera_id.as_str());
                self.handle_crossing(*track_id, &info.bbox, frame).await;
            }

            // Overlay reflects the (possibly just refreshed) cache.
            let cached = self.cache.get(*track_id).cloned();
            let mut body_event = OverlayEvent::body(*track_id, info.bbox);
            if let Some(cached) = &cached {
                body_event.crossed = true;
                body_event.name = cached.name.clone();
                body_event.confidence = cached.confidence;
            }
            overlay_events.push(body_event);

            if let Some(cached) = &cached {
                if let Some(face_bbox) = cached.face_bbox {
                    overlay_events.push(OverlayEvent::face(
                        face_bbox,
                        cached.name.clone(),
                        cached.confidence,
                    ));
                }
            }
        }

        *self.overlay.lock().unwrap_or_else(|e| e.into_inner()) = overlay_events.clone();

        // Push overlays while there is something to show, plus one final
        // empty push to clear the browser when everything leaves.
        if !overlay_events.is_empty() || self.had_events {
            self.had_events = !overlay_events.is_empty();
            self.ctx
                .sink
                .publish_overlay(&self.config.camera_id, overlay_events)
                .await;
        }
    }

    /// Feed face observations to the auto-zoom at its own cadence.
    async fn maybe_update_zoom(&mut self, detection: &DetectResponse) {
        let Some(zoom) = self.zoom.as_mut() else {
            return;
        };
        let now = Instant::now();
        let due = match self.last_zoom_tick {
            Some(last) => now.duration_since(last) >= self.ctx.settings.zoom_update_interval,
            None => true,
        };
        if !due {
            return;
        }
        self.last_zoom_tick = Some(now);
        let status = zoom
            .update(
                &detection.faces,
                detection.frame_width,
                detection.frame_height,
            )
            .await;
        *self.zoom_status.lock().unwrap_or_else(|e| e.into_inner()) = Some(status);
    }

    /// Run face recognition for a fired crossing and gate the event.
    async fn handle_crossing(&mut self, track_id: TrackId, bbox: &BoundingBox, frame: &Frame) {
        let face = match self.ctx.detector.recognize(&frame.jpeg, bbox).await {
            Ok(RecognizeResponse { face }) => face,
            Err(e) => {
                warn!(camera = %self.config.camera_id, error = %e, "recognition failed");
                None
            }
        };

        let Some(face) = face else {
            // Still a crossing for stats/overlay, just not attributable.
            info!(camera = %self.config.camera_id, track = %track_id, "body crossed line but no face found");
            self.cache.insert(track_id, None, 0.0, None);
            return;
        };

        let Some(matched) = self.ctx.registry.match_descriptor(&face.descriptor) else {
            info!(camera = %self.config.camera_id, track = %track_id, "face found but no subject match");
            self.cache.insert(track_id, None, 0.0, Some(face.bbox));
            return;
        };

        self.cache.insert(
            track_id,
            Some(matched.name.clone()),
            matched.confidence,
            Some(face.bbox),
        );

        if !self
            .ctx
            .gate
            .allowed(&matched.subject_id, &self.config.camera_id)
        {
            debug!(
                camera = %self.config.camera_id,
                subject = %matched.subject_id,
                "subject in cooldown, skipping"
            );
            metrics::record_event_suppressed(self.config.camera_id.as_str());
            return;
        }
        self.ctx
            .gate
            .mark(&matched.subject_id, &self.config.camera_id);

        self.stats.add_recognition();
        metrics::record_recognition(self.config.camera_id.as_str());

        let snapshot = base64::engine::general_purpose::STANDARD.encode(&frame.jpeg);
        let event = AttendanceEvent::new(
            matched.subject_id,
            matched.name,
            self.config.camera_id.clone(),
            self.config.direction,
            matched.confidence,
        )
        .with_snapshot(snapshot);

        self.ctx.recent.push(event.clone());
        metrics::record_event_published(self.config.camera_id.as_str());
        self.ctx.sink.publish(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MockEventSink;
    use gatewatch_ml_client::{FaceObservation, PersonDetection};
    use gatewatch_models::{PixelBox, Subject, SubjectId};
    use gatewatch_vision::CooldownPolicy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn detect_response(persons: Vec<BoundingBox>) -> DetectResponse {
        DetectResponse {
            frame_width: 700,
            frame_height: 394,
            persons: persons
                .into_iter()
                .map(|bbox| PersonDetection {
                    bbox,
                    confidence: 0.9,
                })
                .collect(),
            faces: Vec::<PixelBox>::new(),
        }
    }

    fn descriptor(seed: f64) -> Vec<f64> {
        (0..128).map(|i| seed + i as f64 * 1e-4).collect()
    }

    fn body(bottom: f64) -> BoundingBox {
        BoundingBox::new(0.45, bottom - 0.35, 0.55, bottom)
    }

    fn frame() -> Frame {
        Frame {
            jpeg: b"fakejpeg".to_vec(),
            fetched_at: Instant::now(),
        }
    }

    struct Harness {
        watcher: CameraWatcher,
        published: Arc<AtomicUsize>,
    }

    fn harness(mut detector: MockDetector, recognized_seed: Option<f64>) -> Harness {
        if let Some(seed) = recognized_seed {
            detector.expect_recognize().returning(move |_, _| {
                Ok(RecognizeResponse {
                    face: Some(FaceObservation {
                        bbox: BoundingBox::new(0.46, 0.32, 0.54, 0.40),
                        descriptor: descriptor(seed),
                    }),
                })
            });
        } else {
            detector
                .expect_recognize()
                .returning(|_, _| Ok(RecognizeResponse { face: None }));
        }

        let registry = Arc::new(SubjectRegistry::new(0.55));
        registry.replace_all(vec![Subject::new("emp-1", "Ada", descriptor(0.10))]);

        let published = Arc::new(AtomicUsize::new(0));
        let mut sink = MockEventSink::new();
        let counter = published.clone();
        sink.expect_publish().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sink.expect_publish_overlay().returning(|_, _| {});

        let settings = WatcherConfig::default();
        let ctx = PipelineContext {
            settings: settings.clone(),
            detector: Arc::new(detector),
            registry,
            gate: Arc::new(CooldownGate::new(
                settings.cooldown,
                CooldownPolicy::ClearOtherCameras,
            )),
            sink: Arc::new(sink),
            recent: Arc::new(RecentEvents::default()),
        };

        let config = CameraConfig {
            camera_id: CameraId::from_string("cam-1"),
            stream_url: "http://cam.local".to_string(),
            tripwire: Tripwire::new(0.1, 0.8, 0.9, 0.8).unwrap(),
            direction: Direction::CheckIn,
            ptz_url: None,
        };

        // The sender may drop; a closed watch channel still reads `false`.
        let (_tx, rx) = watch::channel(false);

        let watcher = CameraWatcher::new(
            config,
            ctx,
            None,
            Arc::new(WatcherStats::default()),
            Arc::new(Mutex::new(Vec::new())),
            Arc::new(Mutex::new(None)),
            rx,
        );

        Harness { watcher, published }
    }

    fn walking_detector(walk: &'static [f64]) -> MockDetector {
        let mut detector = MockDetector::new();
        let step = AtomicUsize::new(0);
        detector.expect_detect().returning(move |_| {
            let i = step.fetch_add(1, Ordering::SeqCst).min(walk.len() - 1);
            Ok(detect_response(vec![body(walk[i])]))
        });
        detector
    }

    #[tokio::test]
    async fn test_recognized_crossing_publishes_once() {
        const WALK: [f64; 6] = [0.95, 0.92, 0.88, 0.84, 0.76, 0.72];
        let mut h = harness(walking_detector(&WALK), Some(0.10));

        for _ in 0..WALK.len() {
            h.watcher.process_frame(&frame()).await;
        }

        // One crossing, one recognition, one published event; the repeat
        // frames on the far side add nothing.
        assert_eq!(h.published.load(Ordering::SeqCst), 1);
        let stats = h.watcher.stats.snapshot();
        assert_eq!(stats.crossings_detected, 1);
        assert_eq!(stats.faces_recognized, 1);
        assert_eq!(h.watcher.ctx.recent.len(), 1);

        let event = &h.watcher.ctx.recent.snapshot()[0];
        assert_eq!(event.subject_id, SubjectId::from_string("emp-1"));
        assert_eq!(event.subject_name, "Ada");
        assert!(event.snapshot.is_some());
    }

    #[tokio::test]
    async fn test_unrecognized_crossing_counts_but_does_not_publish() {
        const WALK: [f64; 6] = [0.95, 0.92, 0.88, 0.84, 0.76, 0.72];
        let mut h = harness(walking_detector(&WALK), None);

        for _ in 0..WALK.len() {
            h.watcher.process_frame(&frame()).await;
        }

        let stats = h.watcher.stats.snapshot();
        assert_eq!(stats.crossings_detected, 1);
        assert_eq!(stats.faces_recognized, 0);
        assert_eq!(h.published.load(Ordering::SeqCst), 0);
        assert!(h.watcher.ctx.recent.is_empty());
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_second_pass() {
        // Walk across, then back (wrong direction re-baseline), then
        // across again: two valid crossings inside the window.
        const WALK: [f64; 12] = [
            0.95, 0.92, 0.88, 0.84, 0.76, 0.72, // first pass
            0.84, 0.88, 0.92, // walk back (re-baseline, no fire)
            0.84, 0.76, 0.72, // second pass
        ];
        let mut h = harness(walking_detector(&WALK), Some(0.10));

        for _ in 0..WALK.len() {
            h.watcher.process_frame(&frame()).await;
        }

        let stats = h.watcher.stats.snapshot();
        assert_eq!(stats.crossings_detected, 2);
        // Second recognition is gated by the cooldown.
        assert_eq!(h.published.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_detection_failure_degrades_to_no_tracks() {
        let mut detector = MockDetector::new();
        detector.expect_detect().returning(|_| {
            Err(gatewatch_ml_client::DetectorError::ServiceUnavailable(
                "down".to_string(),
            ))
        });
        let mut h = harness(detector, None);

        h.watcher.process_frame(&frame()).await;
        let stats = h.watcher.stats.snapshot();
        assert_eq!(stats.crossings_detected, 0);
        assert_eq!(h.published.load(Ordering::SeqCst), 0);
    }
}
