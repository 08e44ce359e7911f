//! Cooldown-based event deduplication.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use gatewatch_models::{CameraId, SubjectId};
use tracing::debug;

/// How marking one camera affects the same subject's other cameras.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownPolicy {
    /// Each (subject, camera) pair cools down independently.
    PerCamera,
    /// Marking a camera clears the subject's entries on every other
    /// camera, so a subject walking from camera A to camera B fires on B
    /// immediately while A stays suppressed for its full window. This
    /// trades duplicate suppression for never missing a cross-camera
    /// traversal; preserved as a product decision.
    ClearOtherCameras,
}

/// Process-wide suppression table for attendance events.
///
/// Shared by every camera loop; the lock is held only for map access,
/// never across a network call.
pub struct CooldownGate {
    window: Duration,
    policy: CooldownPolicy,
    entries: Mutex<HashMap<(SubjectId, CameraId), Instant>>,
}

impl CooldownGate {
    /// Create a gate with the given window and policy.
    pub fn new(window: Duration, policy: CooldownPolicy) -> Self {
        Self {
            window,
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Whether an event for this (subject, camera) may be reported now.
    pub fn allowed(&self, subject: &SubjectId, camera: &CameraId) -> bool {
        self.allowed_at(subject, camera, Instant::now())
    }

    /// Record that an event fired for this (subject, camera) now.
    pub fn mark(&self, subject: &SubjectId, camera: &CameraId) {
        self.mark_at(subject, camera, Instant::now());
    }

    pub(crate) fn allowed_at(&self, subject: &SubjectId, camera: &CameraId, now: Instant) -> bool {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(&(subject.clone(), camera.clone())) {
            Some(&last) => now.duration_since(last) >= self.window,
            None => true,
        }
    }

    pub(crate) fn mark_at(&self, subject: &SubjectId, camera: &CameraId, now: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if self.policy == CooldownPolicy::ClearOtherCameras {
            let before = entries.len();
            entries.retain(|(s, c), _| s != subject || c == camera);
            let cleared = before - entries.len();
            if cleared > 0 {
                debug!(subject = %subject, cleared, "cleared other-camera cooldowns");
            }
        }
        entries.insert((subject.clone(), camera.clone()), now);
    }

    /// Number of live cooldown entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
