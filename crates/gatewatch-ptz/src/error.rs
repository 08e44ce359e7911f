//! PTZ error types.

use thiserror::Error;

pub type PtzResult<T> = Result<T, PtzError>;

#[derive(Debug, Error)]
pub enum PtzError {
    #[error("Invalid PTZ configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
