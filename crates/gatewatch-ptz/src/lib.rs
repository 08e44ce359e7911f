//! Physical PTZ zoom control.
//!
//! This crate provides:
//! - [`PtzChannel`] / [`HttpPtzChannel`]: the authenticated zoom command
//!   channel to the camera's PTZ HTTP API
//! - [`AutoZoom`]: a five-state feedback controller that maps face-size
//!   observations to zoom-motor commands, with persistence gating, plateau
//!   detection and safety timeouts

pub mod client;
pub mod error;
pub mod zoom;

pub use client::{HttpPtzChannel, PtzChannel, PtzConfig, ZoomDirection};
pub use error::{PtzError, PtzResult};
pub use zoom::{AutoZoom, ZoomState, ZoomStatus, ZoomTuning};
