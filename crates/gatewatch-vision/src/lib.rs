//! Line-crossing analytics core.
//!
//! This crate provides:
//! - [`CentroidTracker`]: frame-to-frame body tracking by nearest centroid
//! - [`CrossingEngine`]: tripwire crossing detection with per-track
//!   initial-side memory
//! - [`CooldownGate`]: (subject, camera) event deduplication
//! - [`SubjectRegistry`]: known-subject descriptor matching
//! - [`RecognitionCache`]: short-lived per-track recognition labels for
//!   overlay rendering
//!
//! Everything here is synchronous and owned by a single camera loop; the
//! only shared pieces (cooldown table, subject registry) carry their own
//! narrow locks.

pub mod cache;
pub mod cooldown;
pub mod crossing;
pub mod matcher;
pub mod tracker;

pub use cache::{CachedRecognition, RecognitionCache};
pub use cooldown::{CooldownGate, CooldownPolicy};
pub use crossing::{Crossing, CrossingEngine};
pub use matcher::{distance_to_confidence, face_distance, SubjectMatch, SubjectRegistry};
pub use tracker::{CentroidTracker, TrackedBody, TrackerConfig};
