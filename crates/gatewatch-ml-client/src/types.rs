//! Detection service request/response types.

use serde::{Deserialize, Serialize};

use gatewatch_models::{BoundingBox, PixelBox};

/// One detected person.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDetection {
    /// Body box in normalized coordinates
    pub bbox: BoundingBox,
    /// Detector confidence (0-1)
    pub confidence: f64,
}

/// Response from person/face detection over one frame.
///
/// Person boxes are normalized; face boxes are pixel coordinates in the
/// service's downscaled working frame, which is what the auto-zoom tuning
/// is calibrated against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    /// Width of the service's working frame in pixels
    pub frame_width: u32,
    /// Height of the service's working frame in pixels
    pub frame_height: u32,
    /// Person detections above the confidence floor
    #[serde(default)]
    pub persons: Vec<PersonDetection>,
    /// Face boxes (no descriptors; encoding runs only on crossings)
    #[serde(default)]
    pub faces: Vec<PixelBox>,
}

/// A located and encoded face.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceObservation {
    /// Face box in normalized frame coordinates
    pub bbox: BoundingBox,
    /// 128-dim face descriptor
    pub descriptor: Vec<f64>,
}

/// Response from recognition over a body region.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeResponse {
    /// Largest face found in the region, if any
    pub face: Option<FaceObservation>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}
