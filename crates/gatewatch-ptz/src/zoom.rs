//! Hardware auto-zoom feedback controller.
//!
//! Maps face-size observations (~1 Hz) to physical zoom-motor commands.
//! The camera has optical zoom only, no pan, so the controller cares about
//! face height alone:
//!
//! ```text
//!   IDLE -> ZOOMING_IN -> TRACKING <-> ZOOMING_IN / ZOOMING_OUT
//!                          ↓
//!                      RETURNING -> IDLE
//! ```
//!
//! Plateau detection guards against an infinite zoom-retry loop once the
//! lens hits its optical limit: two consecutive zoom-in cycles that fail
//! to grow the face by more than 30% suppress further zoom-in attempts
//! until a full RETURNING -> IDLE reset.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use gatewatch_models::PixelBox;

use crate::client::{PtzChannel, ZoomDirection};

/// Controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomState {
    Idle,
    ZoomingIn,
    Tracking,
    ZoomingOut,
    Returning,
}

impl ZoomState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoomState::Idle => "idle",
            ZoomState::ZoomingIn => "zooming_in",
            ZoomState::Tracking => "tracking",
            ZoomState::ZoomingOut => "zooming_out",
            ZoomState::Returning => "returning",
        }
    }
}

/// Tuning constants, in pixels of the detection service's downscaled
/// frame. Calibrated for a 5 MP camera with ~1.6x optical zoom downscaled
/// to ~700 px width; targets must stay achievable by the lens.
#[derive(Debug, Clone)]
pub struct ZoomTuning {
    /// Faces below this are "far": zoom in
    pub small_px: i32,
    /// Stop zooming in once the smallest face reaches this
    pub target_px: i32,
    /// Faces above this are "too close": zoom out
    pub large_px: i32,
    /// A far face must persist this long before zoom starts
    pub persist: Duration,
    /// Return to wide angle after this long without any face
    pub no_face_timeout: Duration,
    /// Safety cap on continuous zoom-in time
    pub max_zoom_in: Duration,
    /// Safety cap on a full zoom-out return
    pub max_return: Duration,
    /// Interval between speed re-evaluations while zooming in
    pub speed_update_interval: Duration,
    /// Safety cap on a corrective zoom-out
    pub max_zoom_out: Duration,
    /// Autofocus settle time after the motor stops
    pub focus_settle: Duration,
    /// A zoom cycle must grow the face by this factor to not count as a
    /// plateau
    pub plateau_growth: f64,
    /// Consecutive plateaus that suppress further zoom-in
    pub max_plateaus: u32,
}

impl Default for ZoomTuning {
    fn default() -> Self {
        Self {
            small_px: 80,
            target_px: 80,
            large_px: 180,
            persist: Duration::from_secs(1),
            no_face_timeout: Duration::from_secs(5),
            max_zoom_in: Duration::from_secs(12),
            max_return: Duration::from_secs(15),
            speed_update_interval: Duration::from_millis(1500),
            max_zoom_out: Duration::from_secs(8),
            focus_settle: Duration::from_secs(2),
            plateau_growth: 1.3,
            max_plateaus: 2,
        }
    }
}

/// Controller status snapshot for the health endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomStatus {
    pub state: ZoomState,
    pub is_moving: bool,
    pub direction: Option<ZoomDirection>,
    pub speed: u8,
    pub connected: bool,
    pub plateau_count: u32,
}

/// The feedback controller for one physical camera.
///
/// Owned by a single camera loop; exclusive `&mut` access replaces the
/// lock the update path would otherwise need. `update()` blocks only for
/// the command round-trip (bounded by the channel timeout); `start()` and
/// `reset()` perform multi-second settle waits and must only run at
/// session start/stop.
pub struct AutoZoom {
    channel: Arc<dyn PtzChannel>,
    tuning: ZoomTuning,
    state: ZoomState,

    // Face observation timing
    last_face_time: Option<Instant>,
    persist_start: Option<Instant>,

    // Motor state
    is_moving: bool,
    move_direction: Option<ZoomDirection>,
    current_speed: u8,
    zoom_start_time: Option<Instant>,
    last_cmd_time: Option<Instant>,
    zoom_stopped_time: Option<Instant>,

    // Plateau detection
    zoom_start_face_size: i32,
    plateau_count: u32,
}

impl AutoZoom {
    /// Create a controller over a command channel.
    pub fn new(channel: Arc<dyn PtzChannel>, tuning: ZoomTuning) -> Self {
        Self {
            channel,
            tuning,
            state: ZoomState::Idle,
            last_face_time: None,
            persist_start: None,
            is_moving: false,
            move_direction: None,
            current_speed: 0,
            zoom_start_time: None,
            last_cmd_time: None,
            zoom_stopped_time: None,
            zoom_start_face_size: 0,
            plateau_count: 0,
        }
    }

    /// Initialize at session start: settle to wide angle.
    pub async fn start(&mut self) {
        info!("auto-zoom: initializing, zooming out to wide angle");
        self.start_motor(ZoomDirection::Out, 7, Instant::now()).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        self.stop_motor(Instant::now()).await;
        self.state = ZoomState::Idle;
        info!("auto-zoom: ready (wide angle)");
    }

    /// Stop and return to wide angle. Call on shutdown.
    pub async fn reset(&mut self) {
        info!("auto-zoom: resetting to wide angle");
        self.stop_motor(Instant::now()).await;
        self.start_motor(ZoomDirection::Out, 7, Instant::now()).await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        self.stop_motor(Instant::now()).await;
        self.state = ZoomState::Idle;
        self.plateau_count = 0;
    }

    /// Feed this cycle's face detections to the controller.
    ///
    /// `faces` are pixel boxes in the detection service's downscaled
    /// frame of `frame_w` x `frame_h`.
    pub async fn update(&mut self, faces: &[PixelBox], frame_w: u32, frame_h: u32) -> ZoomStatus {
        self.tick(Instant::now(), faces, frame_w, frame_h).await
    }

    /// Current status without advancing the machine.
    pub fn status(&self) -> ZoomStatus {
        ZoomStatus {
            state: self.state,
            is_moving: self.is_moving,
            direction: self.move_direction,
            speed: self.current_speed,
            connected: self.channel.connected(),
            plateau_count: self.plateau_count,
        }
    }

    /// True while camera autofocus settles after the motor stopped.
    pub fn is_focusing(&self) -> bool {
        self.is_focusing_at(Instant::now())
    }

    /// Whether the controller currently holds a zoomed view.
    pub fn is_zoomed(&self) -> bool {
        matches!(
            self.state,
            ZoomState::ZoomingIn | ZoomState::Tracking | ZoomState::ZoomingOut
        )
    }

    pub(crate) fn is_focusing_at(&self, now: Instant) -> bool {
        if self.is_moving {
            return false;
        }
        match self.zoom_stopped_time {
            Some(stopped) => now.duration_since(stopped) < self.tuning.focus_settle,
            None => false,
        }
    }

    pub(crate) async fn tick(
        &mut self,
        now: Instant,
        faces: &[PixelBox],
        frame_w: u32,
        frame_h: u32,
    ) -> ZoomStatus {
        let sizes: Vec<i32> = faces.iter().map(|f| f.height()).collect();
        debug!(
            state = self.state.as_str(),
            faces = sizes.len(),
            frame_w,
            frame_h,
            "zoom tick"
        );

        if !faces.is_empty() {
            self.last_face_time = Some(now);
        }

        match self.state {
            ZoomState::Idle => self.idle_logic(now, &sizes).await,
            ZoomState::ZoomingIn => self.zooming_in_logic(now, &sizes).await,
            ZoomState::Tracking => self.tracking_logic(now, &sizes).await,
            ZoomState::ZoomingOut => self.zooming_out_logic(now, &sizes).await,
            ZoomState::Returning => self.returning_logic(now, &sizes).await,
        }

        self.status()
    }

    // ------------------------------------------------------------------
    // State logic
    // ------------------------------------------------------------------

    /// IDLE: watch for far faces that need zoom.
    async fn idle_logic(&mut self, now: Instant, sizes: &[i32]) {
        let Some(&smallest) = sizes.iter().min() else {
            self.persist_start = None;
            return;
        };

        if smallest < self.tuning.small_px {
            match self.persist_start {
                None => self.persist_start = Some(now),
                Some(since) if now.duration_since(since) >= self.tuning.persist => {
                    if self.plateau_count >= self.tuning.max_plateaus {
                        debug!(face = smallest, "idle: zoom suppressed, lens plateaued");
                        return;
                    }
                    let speed = self.zoom_in_speed(smallest);
                    self.start_motor(ZoomDirection::In, speed, now).await;
                    self.zoom_start_time = Some(now);
                    self.zoom_start_face_size = smallest;
                    self.state = ZoomState::ZoomingIn;
                    info!(face = smallest, speed, "IDLE -> ZOOMING_IN");
                }
                Some(_) => {}
            }
        } else {
            self.persist_start = None;
        }
    }

    /// ZOOMING_IN: actively zooming, monitor face size growth.
    async fn zooming_in_logic(&mut self, now: Instant, sizes: &[i32]) {
        // Lost all faces
        if self.no_face_for(now) > self.tuning.no_face_timeout {
            self.stop_motor(now).await;
            self.start_motor(ZoomDirection::Out, 6, now).await;
            self.zoom_start_time = Some(now);
            self.state = ZoomState::Returning;
            info!("ZOOMING_IN -> RETURNING (faces lost)");
            return;
        }

        // Safety timeout, with plateau bookkeeping
        if self.zoom_elapsed(now) > self.tuning.max_zoom_in {
            self.stop_motor(now).await;
            let current_max = sizes.iter().max().copied().unwrap_or(0);
            let grown = f64::from(current_max)
                > f64::from(self.zoom_start_face_size) * self.tuning.plateau_growth;
            if self.zoom_start_face_size > 0 && !grown {
                self.plateau_count += 1;
                info!(
                    plateau = self.plateau_count,
                    start = self.zoom_start_face_size,
                    now = current_max,
                    "ZOOMING_IN -> TRACKING (safety timeout, plateau)"
                );
            } else {
                self.plateau_count = 0;
                info!(
                    start = self.zoom_start_face_size,
                    now = current_max,
                    "ZOOMING_IN -> TRACKING (safety timeout, face grew)"
                );
            }
            self.state = ZoomState::Tracking;
            return;
        }

        let Some(&smallest) = sizes.iter().min() else {
            return; // no detection this cycle, keep zooming
        };
        let largest = sizes.iter().max().copied().unwrap_or(smallest);

        // Overshoot check comes before target-reached
        if largest > self.tuning.large_px {
            self.stop_motor(now).await;
            self.start_motor(ZoomDirection::Out, 2, now).await;
            self.zoom_start_time = Some(now);
            self.state = ZoomState::ZoomingOut;
            info!(face = largest, "ZOOMING_IN -> ZOOMING_OUT (overshoot)");
            return;
        }

        if smallest >= self.tuning.target_px {
            self.stop_motor(now).await;
            self.state = ZoomState::Tracking;
            info!(face = smallest, "ZOOMING_IN -> TRACKING (target reached)");
            return;
        }

        // Periodic speed re-evaluation as the face approaches target size
        let due = match self.last_cmd_time {
            Some(last) => now.duration_since(last) > self.tuning.speed_update_interval,
            None => true,
        };
        if due {
            let new_speed = self.zoom_in_speed(smallest);
            if new_speed != self.current_speed {
                let old = self.current_speed;
                self.stop_motor(now).await;
                self.start_motor(ZoomDirection::In, new_speed, now).await;
                debug!(face = smallest, old, new = new_speed, "zoom speed adjusted");
            }
        }
    }

    /// TRACKING: at target zoom level, make fine adjustments.
    async fn tracking_logic(&mut self, now: Instant, sizes: &[i32]) {
        if self.no_face_for(now) > self.tuning.no_face_timeout {
            self.start_motor(ZoomDirection::Out, 5, now).await;
            self.zoom_start_time = Some(now);
            self.state = ZoomState::Returning;
            info!("TRACKING -> RETURNING (faces lost)");
            return;
        }

        let Some(&smallest) = sizes.iter().min() else {
            return;
        };
        let largest = sizes.iter().max().copied().unwrap_or(smallest);

        if smallest < self.tuning.small_px && self.plateau_count < self.tuning.max_plateaus {
            let speed = self.zoom_in_speed(smallest);
            self.start_motor(ZoomDirection::In, speed, now).await;
            self.zoom_start_time = Some(now);
            self.zoom_start_face_size = smallest;
            self.state = ZoomState::ZoomingIn;
            info!(face = smallest, "TRACKING -> ZOOMING_IN (face shrunk)");
            return;
        }

        if largest > self.tuning.large_px {
            self.start_motor(ZoomDirection::Out, 2, now).await;
            self.zoom_start_time = Some(now);
            self.state = ZoomState::ZoomingOut;
            info!(face = largest, "TRACKING -> ZOOMING_OUT (face too large)");
        }
    }

    /// ZOOMING_OUT: corrective zoom-out until faces fit again.
    async fn zooming_out_logic(&mut self, now: Instant, sizes: &[i32]) {
        let Some(&smallest) = sizes.iter().min() else {
            if self.no_face_for(now) > self.tuning.no_face_timeout {
                self.state = ZoomState::Returning;
                info!("ZOOMING_OUT -> RETURNING (faces lost)");
            }
            return;
        };
        let largest = sizes.iter().max().copied().unwrap_or(smallest);

        if largest <= self.tuning.target_px + 20 && smallest >= self.tuning.small_px / 2 {
            self.stop_motor(now).await;
            self.state = ZoomState::Tracking;
            info!(face = largest, "ZOOMING_OUT -> TRACKING");
            return;
        }

        if self.zoom_elapsed(now) > self.tuning.max_zoom_out {
            self.stop_motor(now).await;
            self.state = ZoomState::Tracking;
            info!("ZOOMING_OUT -> TRACKING (timeout)");
        }
    }

    /// RETURNING: zooming out fully to wide angle.
    async fn returning_logic(&mut self, now: Instant, sizes: &[i32]) {
        // A face appearing during the return interrupts it.
        if let Some(&smallest) = sizes.iter().min() {
            self.stop_motor(now).await;
            if smallest < self.tuning.small_px {
                let speed = self.zoom_in_speed(smallest);
                self.start_motor(ZoomDirection::In, speed, now).await;
                self.zoom_start_time = Some(now);
                self.state = ZoomState::ZoomingIn;
                info!(face = smallest, "RETURNING -> ZOOMING_IN (new face)");
            } else {
                self.state = ZoomState::Tracking;
                info!(face = smallest, "RETURNING -> TRACKING (face appeared)");
            }
            return;
        }

        if self.zoom_elapsed(now) > self.tuning.max_return {
            self.stop_motor(now).await;
            self.state = ZoomState::Idle;
            self.plateau_count = 0;
            info!("RETURNING -> IDLE (timeout)");
            return;
        }

        // No faces for far longer than a full return takes: assume wide.
        if self.no_face_for(now) > self.tuning.no_face_timeout + self.tuning.max_return {
            self.stop_motor(now).await;
            self.state = ZoomState::Idle;
            self.plateau_count = 0;
            info!("RETURNING -> IDLE (long timeout)");
        }
    }

    // ------------------------------------------------------------------
    // Motor helpers
    // ------------------------------------------------------------------

    async fn start_motor(&mut self, direction: ZoomDirection, speed: u8, now: Instant) {
        if self.channel.start_zoom(direction, speed).await {
            self.is_moving = true;
            self.move_direction = Some(direction);
            self.current_speed = speed;
            self.last_cmd_time = Some(now);
        }
        // A failed start leaves is_moving = false; the next update retries.
    }

    async fn stop_motor(&mut self, now: Instant) {
        if self.is_moving {
            if let Some(direction) = self.move_direction {
                self.channel.stop_zoom(direction).await;
            }
            self.is_moving = false;
            self.move_direction = None;
            self.current_speed = 0;
            self.zoom_stopped_time = Some(now);
        }
    }

    /// Zoom-in speed (1-7) from how far the face is from target size:
    /// fast when tiny, fine control near the goal.
    fn zoom_in_speed(&self, face_px: i32) -> u8 {
        if face_px < 30 {
            7
        } else if face_px < 50 {
            6
        } else if face_px < 80 {
            5
        } else if face_px < 100 {
            4
        } else if face_px < self.tuning.small_px {
            3
        } else {
            1
        }
    }

    fn no_face_for(&self, now: Instant) -> Duration {
        match self.last_face_time {
            Some(last) => now.duration_since(last),
            None => Duration::MAX,
        }
    }

    fn zoom_elapsed(&self, now: Instant) -> Duration {
        match self.zoom_start_time {
            Some(start) => now.duration_since(start),
            None => Duration::ZERO,
        }
    }
}
