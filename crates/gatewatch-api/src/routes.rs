//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::cameras::{camera_overlay, list_cameras, start_camera, stop_camera};
use crate::handlers::health::{health, ready};
use crate::handlers::status::status;
use crate::handlers::subjects::sync_subjects;
use crate::middleware::{cors_layer, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api_routes = Router::new()
        .route("/cameras/start", post(start_camera))
        .route("/cameras/stop", post(stop_camera))
        .route("/cameras", get(list_cameras))
        .route("/cameras/:camera_id/overlay", get(camera_overlay))
        .route("/subjects/sync", post(sync_subjects));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready))
        .route("/status", get(status));

    let mut router = Router::new().nest("/api", api_routes).merge(health_routes);

    if let Some(handle) = metrics_handle {
        router = router.route("/metrics", get(move || async move { handle.render() }));
    }

    router
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::config::ApiConfig;
    use gatewatch_watcher::WatcherConfig;

    fn app() -> Router {
        let state =
            AppState::new(ApiConfig::default(), WatcherConfig::default()).expect("state builds");
        create_router(state, None)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn test_health_reports_service() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "gatewatch");
        assert_eq!(body["subjectsLoaded"], 0);
    }

    #[tokio::test]
    async fn test_start_camera_rejects_invalid_request() {
        let request_body = json!({
            "cameraId": "",
            "streamUrl": "not-a-url",
            "tripwire": { "x1": 0.1, "y1": 0.8, "x2": 0.9, "y2": 0.8 },
            "direction": "check_in"
        });
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/cameras/start")
                    .header("content-type", "application/json")
                    .body(Body::from(request_body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stop_unknown_camera_is_404() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/cameras/stop")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "cameraId": "ghost" }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_subjects_sync_filters_bad_descriptors() {
        let request_body = json!({
            "subjects": [
                { "id": "e-1", "name": "Ada", "descriptor": vec![0.0f64; 128] },
                { "id": "e-2", "name": "Ben", "descriptor": vec![0.0f64; 64] }
            ]
        });
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/subjects/sync")
                    .header("content-type", "application/json")
                    .body(Body::from(request_body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["loaded"], 1);
        assert_eq!(body["skipped"], 1);
    }
}
