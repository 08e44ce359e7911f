//! Attendance and overlay event records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::BoundingBox;
use crate::ids::{CameraId, SubjectId, TrackId};

/// Crossing direction mapped to its attendance meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Entry crossing
    CheckIn,
    /// Exit crossing
    CheckOut,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::CheckIn => "check_in",
            Direction::CheckOut => "check_out",
        }
    }
}

/// An attendance event produced by a recognized line crossing.
///
/// Pushed to the upstream API fire-and-forget; the snapshot is the raw
/// camera JPEG, base64-encoded, untouched by this service.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEvent {
    /// Unique event id
    pub event_id: String,
    /// Recognized subject
    pub subject_id: SubjectId,
    /// Subject display name
    pub subject_name: String,
    /// Camera that observed the crossing
    pub camera_id: CameraId,
    /// Crossing direction
    pub direction: Direction,
    /// Recognition confidence (0-1)
    pub confidence: f64,
    /// Event time (UTC)
    pub timestamp: DateTime<Utc>,
    /// Base64 JPEG snapshot, if a frame was available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
}

impl AttendanceEvent {
    /// Create an event stamped with a fresh id and the current time.
    pub fn new(
        subject_id: SubjectId,
        subject_name: impl Into<String>,
        camera_id: CameraId,
        direction: Direction,
        confidence: f64,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            subject_id,
            subject_name: subject_name.into(),
            camera_id,
            direction,
            confidence,
            timestamp: Utc::now(),
            snapshot: None,
        }
    }

    /// Attach a base64 snapshot.
    pub fn with_snapshot(mut self, snapshot: String) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

/// Kind of overlay record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    /// Tracked body box
    Body,
    /// Recognized face box
    Face,
}

/// A per-frame overlay record for browser rendering.
///
/// These are display-only: they carry the cached recognition label so a
/// still-visible track keeps its name between recognitions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverlayEvent {
    /// Record kind
    pub kind: OverlayKind,
    /// Box in normalized coordinates
    pub bbox: BoundingBox,
    /// Track id for body records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<TrackId>,
    /// Whether this track has crossed the tripwire
    pub crossed: bool,
    /// Recognized name, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Recognition confidence (0 when unrecognized)
    pub confidence: f64,
}

impl OverlayEvent {
    /// Body overlay with no recognition attached.
    pub fn body(track_id: TrackId, bbox: BoundingBox) -> Self {
        Self {
            kind: OverlayKind::Body,
            bbox,
            track_id: Some(track_id),
            crossed: false,
            name: None,
            confidence: 0.0,
        }
    }

    /// Face overlay carrying a recognition label.
    pub fn face(bbox: BoundingBox, name: Option<String>, confidence: f64) -> Self {
        Self {
            kind: OverlayKind::Face,
            bbox,
            track_id: None,
            crossed: true,
            name,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attendance_event_wire_format() {
        let event = AttendanceEvent::new(
            SubjectId::from_string("emp-7"),
            "Ada",
            CameraId::from_string("cam-1"),
            Direction::CheckIn,
            0.92,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["subjectId"], "emp-7");
        assert_eq!(json["cameraId"], "cam-1");
        assert_eq!(json["direction"], "check_in");
        assert!(json.get("snapshot").is_none());
    }

    #[test]
    fn test_overlay_body_defaults() {
        let ev = OverlayEvent::body(TrackId(3), BoundingBox::new(0.1, 0.1, 0.2, 0.3));
        assert_eq!(ev.kind, OverlayKind::Body);
        assert!(!ev.crossed);
        assert_eq!(ev.confidence, 0.0);
    }
}
