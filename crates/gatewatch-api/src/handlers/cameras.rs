//! Camera lifecycle handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use gatewatch_models::{CameraId, Direction, OverlayEvent, Tripwire};
use gatewatch_watcher::{CameraConfig, CameraSummary};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request to start watching a camera.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CameraStartRequest {
    #[validate(length(min = 1, max = 64))]
    pub camera_id: String,
    #[validate(url)]
    pub stream_url: String,
    pub tripwire: Tripwire,
    pub direction: Direction,
    #[validate(url)]
    pub ptz_url: Option<String>,
}

/// Request to stop watching a camera.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStopRequest {
    pub camera_id: String,
}

/// Start a camera watcher.
pub async fn start_camera(
    State(state): State<AppState>,
    Json(req): Json<CameraStartRequest>,
) -> ApiResult<Json<Value>> {
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let camera_id = CameraId::from_string(&req.camera_id);
    let config = CameraConfig {
        camera_id: camera_id.clone(),
        stream_url: req.stream_url,
        tripwire: req.tripwire,
        direction: req.direction,
        ptz_url: req.ptz_url,
    };

    state.manager.start_camera(config).await?;
    Ok(Json(json!({ "status": "started", "cameraId": camera_id })))
}

/// Stop a camera watcher.
pub async fn stop_camera(
    State(state): State<AppState>,
    Json(req): Json<CameraStopRequest>,
) -> ApiResult<Json<Value>> {
    let camera_id = CameraId::from_string(&req.camera_id);
    state.manager.stop_camera(&camera_id).await?;
    Ok(Json(json!({ "status": "stopped", "cameraId": camera_id })))
}

/// List running cameras.
pub async fn list_cameras(State(state): State<AppState>) -> Json<Vec<CameraSummary>> {
    Json(state.manager.list().await)
}

/// Latest overlay records for one camera, for browser rendering.
pub async fn camera_overlay(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> ApiResult<Json<Vec<OverlayEvent>>> {
    let camera_id = CameraId::from_string(camera_id);
    Ok(Json(state.manager.overlay(&camera_id).await?))
}
