//! Tripwire crossing detection.
//!
//! Instead of frame-to-frame segment intersection, the engine remembers
//! which side of the line each track first appeared on and fires when the
//! side flips in the configured direction. This survives tracking jitter
//! and slow movement across the line.

use std::collections::HashMap;

use gatewatch_models::{BoundingBox, CrossDirection, LineType, TrackId, Tripwire};
use tracing::{debug, info};

/// Minimum |cross product| to establish or flip a side.
///
/// Values inside the band are treated as "on the line": jitter, not
/// movement.
pub const DEFAULT_JITTER_THRESHOLD: f64 = 0.005;

/// A fired crossing for one track at one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Crossing {
    /// Track that crossed
    pub track_id: TrackId,
    /// Side value when the side was established
    pub side_before: f64,
    /// Side value at the firing frame
    pub side_after: f64,
    /// Check-point that produced the firing side value
    pub point: (f64, f64),
}

/// Per-camera tripwire state machine.
///
/// Holds the per-track initial-side map. An absent entry means "side not
/// yet established"; entries are deleted when a crossing fires or the
/// track dies, so each pass fires exactly once.
pub struct CrossingEngine {
    tripwire: Tripwire,
    threshold: f64,
    initial_side: HashMap<TrackId, f64>,
}

impl CrossingEngine {
    /// Create an engine for one camera's tripwire.
    pub fn new(tripwire: Tripwire) -> Self {
        Self::with_threshold(tripwire, DEFAULT_JITTER_THRESHOLD)
    }

    /// Create an engine with an explicit jitter threshold.
    pub fn with_threshold(tripwire: Tripwire, threshold: f64) -> Self {
        Self {
            tripwire,
            threshold,
            initial_side: HashMap::new(),
        }
    }

    /// The configured tripwire.
    pub fn tripwire(&self) -> &Tripwire {
        &self.tripwire
    }

    /// Signed side of the line for a point: the 2D cross product of the
    /// line direction against (start -> point). Zero means on the line.
    pub fn side(&self, point: (f64, f64)) -> f64 {
        let (dx, dy) = self.tripwire.direction();
        dx * (point.1 - self.tripwire.y1) - dy * (point.0 - self.tripwire.x1)
    }

    /// The point of a body box tested against the line.
    ///
    /// Free lines are floor barriers: the feet (bottom-center) cross them,
    /// while a torso-centered centroid never reaches a line drawn at floor
    /// level. Vertical lines are doorway barriers: the leading edge in the
    /// configured direction pierces them at mid-height.
    pub fn check_point(&self, bbox: &BoundingBox) -> (f64, f64) {
        match self.tripwire.line_type {
            LineType::Vertical => {
                let y = bbox.mid_y();
                match self.tripwire.cross_direction {
                    CrossDirection::Forward => (bbox.x1, y),
                    CrossDirection::Backward => (bbox.x2, y),
                }
            }
            LineType::Free => bbox.bottom_center(),
        }
    }

    /// Observe one live track for this frame.
    ///
    /// Returns a [`Crossing`] the first time the track's check-point lands
    /// unambiguously on the far side in the configured direction. A flip in
    /// the wrong direction re-baselines the stored side instead of firing,
    /// so a later correct-direction flip is still detected.
    pub fn observe(&mut self, track_id: TrackId, bbox: &BoundingBox) -> Option<Crossing> {
        if !self.tripwire.enabled {
            return None;
        }

        let point = self.check_point(bbox);
        let s_curr = self.side(point);

        let s_init = match self.initial_side.get(&track_id) {
            Some(&s) => s,
            None => {
                if s_curr.abs() > self.threshold {
                    self.initial_side.insert(track_id, s_curr);
                    debug!(
                        track = %track_id,
                        side = s_curr,
                        x = point.0,
                        y = point.1,
                        "initial side established"
                    );
                }
                return None;
            }
        };

        // Still on the same side, or too close to the line to call.
        if (s_init > 0.0 && s_curr > 0.0) || (s_init < 0.0 && s_curr < 0.0) {
            return None;
        }
        if s_curr.abs() < self.threshold {
            return None;
        }

        let crossed = match self.tripwire.cross_direction {
            CrossDirection::Backward => s_init < 0.0 && s_curr > 0.0,
            CrossDirection::Forward => s_init > 0.0 && s_curr < 0.0,
        };

        if !crossed {
            // Wrong direction: re-anchor so a later correct-direction flip
            // fires without an immediate spurious event.
            debug!(
                track = %track_id,
                s_init,
                s_curr,
                "crossed in wrong direction, re-baselining"
            );
            self.initial_side.insert(track_id, s_curr);
            return None;
        }

        // Remove the entry so the track cannot retrigger until a fresh
        // side is established.
        self.initial_side.remove(&track_id);
        info!(
            track = %track_id,
            s_init,
            s_curr,
            x = point.0,
            y = point.1,
            "tripwire crossed"
        );

        Some(Crossing {
            track_id,
            side_before: s_init,
            side_after: s_curr,
            point,
        })
    }

    /// Drop side state for tracks no longer alive.
    ///
    /// Must run every frame; ids are never reused but the map would grow
    /// without bound otherwise.
    pub fn retain_tracks(&mut self, is_live: impl Fn(TrackId) -> bool) {
        self.initial_side.retain(|id, _| is_live(*id));
    }

    /// Number of tracks with an established side.
    pub fn established_count(&self) -> usize {
        self.initial_side.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Horizontal floor line at y = 0.8, left-to-right. side() is positive
    // below the line (y > 0.8) and negative above it.
    fn floor_wire() -> Tripwire {
        Tripwire::new(0.1, 0.8, 0.9, 0.8).unwrap()
    }

    fn body_at(cy_bottom: f64) -> BoundingBox {
        BoundingBox::new(0.4, cy_bottom - 0.3, 0.6, cy_bottom)
    }

    #[test]
    fn test_fires_once_per_pass() {
        let mut engine = CrossingEngine::new(floor_wire());
        let id = TrackId(0);

        // Below the line (positive side), walking up across it.
        assert!(engine.observe(id, &body_at(0.95)).is_none()); // establish
        assert!(engine.observe(id, &body_at(0.90)).is_none());
        assert!(engine.observe(id, &body_at(0.85)).is_none());

        let crossing = engine.observe(id, &body_at(0.70)).expect("must fire");
        assert!(crossing.side_before > 0.0);
        assert!(crossing.side_after < 0.0);

        // Keeps moving on the far side: no re-fire until a new side is
        // established and flipped again.
        assert!(engine.observe(id, &body_at(0.65)).is_none());
        assert!(engine.observe(id, &body_at(0.60)).is_none());
        assert_eq!(engine.established_count(), 1); // re-established far side
    }

    #[test]
    fn test_wrong_direction_rebaselines_without_firing() {
        let mut wire = floor_wire();
        wire.cross_direction = CrossDirection::Backward; // requires neg -> pos
        let mut engine = CrossingEngine::new(wire);
        let id = TrackId(1);

        // Positive -> negative is the wrong direction for Backward.
        assert!(engine.observe(id, &body_at(0.95)).is_none());
        assert!(engine.observe(id, &body_at(0.70)).is_none());

        // Baseline is now negative; walking back fires.
        let crossing = engine.observe(id, &body_at(0.95)).expect("must fire");
        assert!(crossing.side_before < 0.0);
        assert!(crossing.side_after > 0.0);
    }

    #[test]
    fn test_jitter_establishes_no_side() {
        let mut engine = CrossingEngine::new(floor_wire());
        let id = TrackId(2);

        // side = 0.8 * (bottom - 0.8); ±0.002 bottom offsets keep |side|
        // at <=0.0016, inside the threshold band.
        for bottom in [0.801, 0.799, 0.802, 0.798, 0.800] {
            assert!(engine.observe(id, &body_at(bottom)).is_none());
        }
        assert_eq!(engine.established_count(), 0);
    }

    #[test]
    fn test_near_line_flip_does_not_fire() {
        let mut engine = CrossingEngine::new(floor_wire());
        let id = TrackId(3);

        assert!(engine.observe(id, &body_at(0.95)).is_none()); // establish +
        // Sign flips but |side| = 0.8 * 0.004 = 0.0032 < threshold: hold.
        assert!(engine.observe(id, &body_at(0.796)).is_none());
        assert_eq!(engine.established_count(), 1);

        // Clearly across now: fires.
        assert!(engine.observe(id, &body_at(0.70)).is_some());
    }

    #[test]
    fn test_disabled_tripwire_never_fires() {
        let mut wire = floor_wire();
        wire.enabled = false;
        let mut engine = CrossingEngine::new(wire);
        let id = TrackId(4);

        assert!(engine.observe(id, &body_at(0.95)).is_none());
        assert!(engine.observe(id, &body_at(0.70)).is_none());
        assert_eq!(engine.established_count(), 0);
    }

    #[test]
    fn test_vertical_line_uses_leading_edge() {
        // Vertical doorway line at x = 0.5, top-to-bottom: direction
        // (0, 0.8), side = -0.8 * (px - 0.5), positive left of the line.
        let mut wire = Tripwire::new(0.5, 0.1, 0.5, 0.9).unwrap();
        wire.line_type = LineType::Vertical;
        let mut engine = CrossingEngine::new(wire);
        let id = TrackId(5);

        // Forward direction: check-point is the LEFT edge of the box.
        // Body on the left of the line, walking right.
        assert!(engine
            .observe(id, &BoundingBox::new(0.20, 0.3, 0.40, 0.7))
            .is_none());
        assert!(engine
            .observe(id, &BoundingBox::new(0.35, 0.3, 0.55, 0.7))
            .is_none()); // left edge still left of the line

        let crossing = engine
            .observe(id, &BoundingBox::new(0.55, 0.3, 0.75, 0.7))
            .expect("left edge crossed the doorway");
        assert!((crossing.point.0 - 0.55).abs() < 1e-9);
        assert!((crossing.point.1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_retain_purges_dead_tracks() {
        let mut engine = CrossingEngine::new(floor_wire());
        engine.observe(TrackId(0), &body_at(0.95));
        engine.observe(TrackId(1), &body_at(0.95));
        assert_eq!(engine.established_count(), 2);

        engine.retain_tracks(|id| id == TrackId(1));
        assert_eq!(engine.established_count(), 1);

        // Re-registered side for a purged id starts from scratch: the
        // first observation only re-establishes, never fires.
        assert!(engine.observe(TrackId(0), &body_at(0.70)).is_none());
    }
}
