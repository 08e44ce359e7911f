//! Per-camera runtime statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters for one camera watcher. Written by the camera loop,
/// read by the health endpoint.
#[derive(Debug, Default)]
pub struct WatcherStats {
    fps_millis: AtomicU64,
    bodies_detected: AtomicU64,
    crossings_detected: AtomicU64,
    faces_recognized: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub fps: f64,
    pub bodies_detected: u64,
    pub crossings_detected: u64,
    pub faces_recognized: u64,
}

impl WatcherStats {
    pub fn set_fps(&self, fps: f64) {
        self.fps_millis
            .store((fps * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn set_bodies(&self, count: u64) {
        self.bodies_detected.store(count, Ordering::Relaxed);
    }

    pub fn add_crossing(&self) {
        self.crossings_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_recognition(&self) {
        self.faces_recognized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fps: self.fps_millis.load(Ordering::Relaxed) as f64 / 1000.0,
            bodies_detected: self.bodies_detected.load(Ordering::Relaxed),
            crossings_detected: self.crossings_detected.load(Ordering::Relaxed),
            faces_recognized: self.faces_recognized.load(Ordering::Relaxed),
        }
    }
}
