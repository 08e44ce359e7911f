//! Recent attendance events.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use gatewatch_models::AttendanceEvent;

use crate::state::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub events: Vec<AttendanceEvent>,
    pub total: usize,
}

/// Return recent attendance events, oldest first.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let events = state.recent.snapshot();
    let total = events.len();
    Json(StatusResponse { events, total })
}
