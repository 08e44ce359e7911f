//! Watcher error types.

use thiserror::Error;

use gatewatch_models::CameraId;

pub type WatcherResult<T> = Result<T, WatcherError>;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Camera {0} is already running")]
    CameraAlreadyRunning(CameraId),

    #[error("Camera {0} not found")]
    CameraNotFound(CameraId),

    #[error("Invalid camera configuration: {0}")]
    InvalidConfig(String),

    #[error("Detector error: {0}")]
    Detector(#[from] gatewatch_ml_client::DetectorError),

    #[error("PTZ error: {0}")]
    Ptz(#[from] gatewatch_ptz::PtzError),
}
