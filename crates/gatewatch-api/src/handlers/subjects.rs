//! Subject registry sync.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use gatewatch_models::Subject;

use crate::state::AppState;

/// Full-replacement sync of the known-subject list.
#[derive(Debug, Deserialize)]
pub struct SubjectsSyncRequest {
    pub subjects: Vec<Subject>,
}

/// Replace the subject registry.
///
/// Records with a malformed descriptor are skipped with a warning rather
/// than failing the whole sync.
pub async fn sync_subjects(
    State(state): State<AppState>,
    Json(req): Json<SubjectsSyncRequest>,
) -> Json<Value> {
    let total = req.subjects.len();
    let valid: Vec<Subject> = req
        .subjects
        .into_iter()
        .filter(|s| {
            if !s.has_valid_descriptor() {
                warn!(subject = %s.id, dims = s.descriptor.len(), "skipping subject with bad descriptor");
                return false;
            }
            true
        })
        .collect();

    let loaded = valid.len();
    state.registry.replace_all(valid);

    Json(json!({ "loaded": loaded, "skipped": total - loaded }))
}
