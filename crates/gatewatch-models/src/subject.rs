//! Known subjects and their face descriptors.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::SubjectId;

/// Dimensionality of the face descriptors produced by the recognition
/// backend.
pub const DESCRIPTOR_DIM: usize = 128;

/// A person known to the system, with a reference face descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    /// Stable subject identifier
    pub id: SubjectId,
    /// Display name
    pub name: String,
    /// 128-dim face descriptor from the recognition backend
    pub descriptor: Vec<f64>,
}

impl Subject {
    /// Create a new subject record.
    pub fn new(id: impl Into<String>, name: impl Into<String>, descriptor: Vec<f64>) -> Self {
        Self {
            id: SubjectId::from_string(id),
            name: name.into(),
            descriptor,
        }
    }

    /// Whether the descriptor has the expected dimensionality.
    pub fn has_valid_descriptor(&self) -> bool {
        self.descriptor.len() == DESCRIPTOR_DIM
    }
}
