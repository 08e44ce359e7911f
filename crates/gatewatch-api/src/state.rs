//! Application state.

use std::sync::Arc;

use gatewatch_ml_client::DetectorClient;
use gatewatch_vision::{CooldownGate, CooldownPolicy, SubjectRegistry};
use gatewatch_watcher::{
    CameraManager, HttpEventSink, PipelineContext, RecentEvents, WatcherConfig,
};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub settings: WatcherConfig,
    pub manager: Arc<CameraManager>,
    pub registry: Arc<SubjectRegistry>,
    pub recent: Arc<RecentEvents>,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ApiConfig, settings: WatcherConfig) -> ApiResult<Self> {
        let detector = DetectorClient::from_env()
            .map_err(|e| ApiError::internal(format!("detector client: {e}")))?;

        let policy = if settings.cooldown_clears_other_cameras {
            CooldownPolicy::ClearOtherCameras
        } else {
            CooldownPolicy::PerCamera
        };

        let registry = Arc::new(SubjectRegistry::new(settings.match_tolerance));
        let recent = Arc::new(RecentEvents::default());
        let ctx = PipelineContext {
            settings: settings.clone(),
            detector: Arc::new(detector),
            registry: registry.clone(),
            gate: Arc::new(CooldownGate::new(settings.cooldown, policy)),
            sink: Arc::new(HttpEventSink::new(
                settings.api_base_url.clone(),
                settings.api_key.clone(),
            )),
            recent: recent.clone(),
        };

        Ok(Self {
            config,
            settings,
            manager: Arc::new(CameraManager::new(ctx)),
            registry,
            recent,
        })
    }
}
