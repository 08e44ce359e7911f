//! Pipeline metrics.

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const BODIES_DETECTED_TOTAL: &str = "gatewatch_bodies_detected_total";
    pub const CROSSINGS_TOTAL: &str = "gatewatch_crossings_total";
    pub const RECOGNITIONS_TOTAL: &str = "gatewatch_recognitions_total";
    pub const EVENTS_PUBLISHED_TOTAL: &str = "gatewatch_events_published_total";
    pub const EVENTS_SUPPRESSED_TOTAL: &str = "gatewatch_events_suppressed_total";
    pub const CAMERAS_ACTIVE: &str = "gatewatch_cameras_active";
}

/// Record bodies seen in one frame.
pub fn record_bodies(camera: &str, count: usize) {
    counter!(names::BODIES_DETECTED_TOTAL, "camera" => camera.to_string())
        .increment(count as u64);
}

/// Record one tripwire crossing.
pub fn record_crossing(camera: &str) {
    counter!(names::CROSSINGS_TOTAL, "camera" => camera.to_string()).increment(1);
}

/// Record one recognized crossing.
pub fn record_recognition(camera: &str) {
    counter!(names::RECOGNITIONS_TOTAL, "camera" => camera.to_string()).increment(1);
}

/// Record one published attendance event.
pub fn record_event_published(camera: &str) {
    counter!(names::EVENTS_PUBLISHED_TOTAL, "camera" => camera.to_string()).increment(1);
}

/// Record one cooldown-suppressed event.
pub fn record_event_suppressed(camera: &str) {
    counter!(names::EVENTS_SUPPRESSED_TOTAL, "camera" => camera.to_string()).increment(1);
}

/// Track the number of running camera watchers.
pub fn set_cameras_active(count: usize) {
    gauge!(names::CAMERAS_ACTIVE).set(count as f64);
}
