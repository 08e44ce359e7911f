//! Centroid-based multi-object tracker.
//!
//! Tracks body detections across frames by greedy nearest-centroid
//! matching. Sized for a handful of cameras with moderate traffic; a full
//! assignment solver would be overkill for 5-15 concurrent bodies.

use std::collections::BTreeMap;

use gatewatch_models::{BoundingBox, TrackId};
use tracing::debug;

/// Tracker parameters.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Consecutive frames a track may go unmatched before deregistration
    pub max_disappeared: u32,
    /// Maximum centroid distance (normalized units) for a match
    pub max_distance: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_disappeared: 15,
            max_distance: 0.15,
        }
    }
}

/// A live track's state after an update.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedBody {
    /// Current centroid
    pub centroid: (f64, f64),
    /// Centroid before this frame's match
    pub previous_centroid: (f64, f64),
    /// Current bounding box
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone)]
struct Track {
    centroid: (f64, f64),
    previous_centroid: (f64, f64),
    bbox: BoundingBox,
    disappeared: u32,
}

/// Assigns persistent ids to per-frame detections via nearest-centroid
/// matching.
///
/// Ids are monotonic and never reused. One tracker instance is owned by
/// exactly one camera loop.
pub struct CentroidTracker {
    config: TrackerConfig,
    next_id: u32,
    tracks: BTreeMap<TrackId, Track>,
}

impl CentroidTracker {
    /// Create a tracker with the given parameters.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            next_id: 0,
            tracks: BTreeMap::new(),
        }
    }

    /// Update the tracker with this frame's detections.
    ///
    /// Returns only tracks that already existed before this call; fresh
    /// registrations first appear in the result on the next frame, once
    /// they have a meaningful previous centroid.
    pub fn update(&mut self, detections: &[BoundingBox]) -> BTreeMap<TrackId, TrackedBody> {
        if detections.is_empty() {
            self.age_all();
            return BTreeMap::new();
        }

        let centroids: Vec<(f64, f64)> = detections.iter().map(|d| d.centroid()).collect();

        if self.tracks.is_empty() {
            for (centroid, bbox) in centroids.iter().zip(detections) {
                self.register(*centroid, *bbox);
            }
            return BTreeMap::new();
        }

        // Full pairwise distance matrix, flattened to (distance, row, col)
        // and matched greedily in ascending distance order.
        let ids: Vec<TrackId> = self.tracks.keys().copied().collect();
        let mut pairs: Vec<(f64, usize, usize)> = Vec::with_capacity(ids.len() * centroids.len());
        for (row, id) in ids.iter().enumerate() {
            let track = &self.tracks[id];
            for (col, centroid) in centroids.iter().enumerate() {
                pairs.push((euclidean(track.centroid, *centroid), row, col));
            }
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut used_rows = vec![false; ids.len()];
        let mut used_cols = vec![false; centroids.len()];
        let mut results = BTreeMap::new();

        for (distance, row, col) in pairs {
            if used_rows[row] || used_cols[col] {
                continue;
            }
            if distance > self.config.max_distance {
                continue;
            }

            let id = ids[row];
            if let Some(track) = self.tracks.get_mut(&id) {
                track.previous_centroid = track.centroid;
                track.centroid = centroids[col];
                track.bbox = detections[col];
                track.disappeared = 0;

                results.insert(
                    id,
                    TrackedBody {
                        centroid: track.centroid,
                        previous_centroid: track.previous_centroid,
                        bbox: track.bbox,
                    },
                );

                used_rows[row] = true;
                used_cols[col] = true;
            }
        }

        // Unmatched tracks age out; unmatched detections become new tracks.
        for (row, id) in ids.iter().enumerate() {
            if !used_rows[row] {
                self.age_one(*id);
            }
        }
        for (col, centroid) in centroids.iter().enumerate() {
            if !used_cols[col] {
                self.register(*centroid, detections[col]);
            }
        }

        results
    }

    /// Ids of all currently live tracks.
    pub fn live_ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.tracks.keys().copied()
    }

    /// Number of live tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether no tracks are live.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn register(&mut self, centroid: (f64, f64), bbox: BoundingBox) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        self.tracks.insert(
            id,
            Track {
                centroid,
                previous_centroid: centroid,
                bbox,
                disappeared: 0,
            },
        );
        debug!(track = %id, "registered track");
        id
    }

    fn age_all(&mut self) {
        let ids: Vec<TrackId> = self.tracks.keys().copied().collect();
        for id in ids {
            self.age_one(id);
        }
    }

    fn age_one(&mut self, id: TrackId) {
        let deregister = match self.tracks.get_mut(&id) {
            Some(track) => {
                track.disappeared += 1;
                track.disappeared > self.config.max_disappeared
            }
            None => false,
        };
        if deregister {
            self.tracks.remove(&id);
            debug!(track = %id, "deregistered track");
        }
    }
}

fn euclidean(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}
