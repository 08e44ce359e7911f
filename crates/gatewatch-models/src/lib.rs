//! Shared data models for the Gatewatch backend.
//!
//! This crate provides Serde-serializable types for:
//! - Bounding-box geometry (normalized and pixel coordinates)
//! - Tripwire line configuration
//! - Known subjects (face descriptors)
//! - Attendance and overlay events
//! - Camera/subject/track identifiers

pub mod event;
pub mod geometry;
pub mod ids;
pub mod subject;
pub mod tripwire;

// Re-export common types
pub use event::{AttendanceEvent, Direction, OverlayEvent, OverlayKind};
pub use geometry::{BoundingBox, PixelBox};
pub use ids::{CameraId, SubjectId, TrackId};
pub use subject::Subject;
pub use tripwire::{CrossDirection, LineType, Tripwire, TripwireError};
