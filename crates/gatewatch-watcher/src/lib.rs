//! Per-camera analytics pipeline.
//!
//! This crate provides:
//! - The camera watcher loop (detect -> track -> crossing -> recognize ->
//!   cooldown -> publish)
//! - Latest-frame-only acquisition from snapshot URLs
//! - Fire-and-forget event publishing to the upstream API
//! - The camera manager owning one supervised task per camera
//! - Env-driven configuration and pipeline metrics

pub mod config;
pub mod error;
pub mod frames;
pub mod manager;
pub mod metrics;
pub mod pipeline;
pub mod sink;
pub mod stats;

pub use config::WatcherConfig;
pub use error::{WatcherError, WatcherResult};
pub use frames::{Frame, FrameSource, HttpFrameSource};
pub use manager::{CameraManager, CameraSummary};
pub use pipeline::{CameraConfig, CameraWatcher, Detector, PipelineContext};
pub use sink::{EventSink, HttpEventSink, RecentEvents};
pub use stats::{StatsSnapshot, WatcherStats};
