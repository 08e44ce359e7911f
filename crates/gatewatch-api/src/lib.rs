//! Axum HTTP control surface.
//!
//! This crate provides:
//! - Camera start/stop/list endpoints
//! - Subject registry sync
//! - Health/status endpoints with per-camera stats and zoom state
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
