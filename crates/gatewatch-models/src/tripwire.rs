//! Tripwire line configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Geometry class of a tripwire line.
///
/// The class decides which point of a tracked body is tested against the
/// line: free lines are floor-level barriers (feet cross them), vertical
/// lines are doorway-style barriers (a side edge pierces them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum LineType {
    /// Arbitrary line; tested against the body's bottom-center point
    #[default]
    Free,
    /// Vertical doorway line; tested against the body's leading edge
    Vertical,
}

/// Which sign flip of the line-side test counts as a crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrossDirection {
    /// Fires on a positive-to-negative side flip
    #[default]
    Forward,
    /// Fires on a negative-to-positive side flip
    Backward,
}

/// A virtual tripwire line in normalized frame coordinates.
///
/// Supplied per camera session and never mutated by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tripwire {
    /// Line start x
    pub x1: f64,
    /// Line start y
    pub y1: f64,
    /// Line end x
    pub x2: f64,
    /// Line end y
    pub y2: f64,
    /// Geometry class
    #[serde(default)]
    pub line_type: LineType,
    /// Crossing direction that fires events
    #[serde(default)]
    pub cross_direction: CrossDirection,
    /// Disabled tripwires are configured but not evaluated
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Tripwire validation failure.
#[derive(Debug, Error)]
pub enum TripwireError {
    #[error("tripwire endpoint out of range: ({0}, {1})")]
    OutOfRange(f64, f64),

    #[error("tripwire is degenerate: endpoints coincide")]
    Degenerate,
}

impl Tripwire {
    /// Create a validated tripwire with default type and direction.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self, TripwireError> {
        let wire = Self {
            x1,
            y1,
            x2,
            y2,
            line_type: LineType::default(),
            cross_direction: CrossDirection::default(),
            enabled: true,
        };
        wire.validate()?;
        Ok(wire)
    }

    /// Validate endpoints: inside the unit square and not coincident.
    pub fn validate(&self) -> Result<(), TripwireError> {
        for &(x, y) in &[(self.x1, self.y1), (self.x2, self.y2)] {
            if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
                return Err(TripwireError::OutOfRange(x, y));
            }
        }
        if self.x1 == self.x2 && self.y1 == self.y2 {
            return Err(TripwireError::Degenerate);
        }
        Ok(())
    }

    /// Line direction vector.
    #[inline]
    pub fn direction(&self) -> (f64, f64) {
        (self.x2 - self.x1, self.y2 - self.y1)
    }
}
