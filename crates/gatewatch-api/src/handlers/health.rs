//! Health check handlers.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use gatewatch_watcher::CameraSummary;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub subjects_loaded: usize,
    pub cameras: Vec<CameraSummary>,
    pub config: ConfigEcho,
}

/// Operationally relevant configuration, echoed for diagnostics.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEcho {
    pub poll_interval_ms: u64,
    pub cooldown_seconds: u64,
    pub match_tolerance: f64,
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "gatewatch".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        subjects_loaded: state.registry.len(),
        cameras: state.manager.list().await,
        config: ConfigEcho {
            poll_interval_ms: state.settings.poll_interval.as_millis() as u64,
            cooldown_seconds: state.settings.cooldown.as_secs(),
            match_tolerance: state.settings.match_tolerance,
        },
    })
}

/// Readiness check endpoint.
pub async fn ready() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ready" }))
}
