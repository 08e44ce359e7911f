//! Short-lived per-track recognition labels.
//!
//! Face recognition runs once per crossing; the overlay keeps showing a
//! stable label for the still-visible track from this cache.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use gatewatch_models::{BoundingBox, TrackId};

/// How long a recognition result stays displayable.
pub const DEFAULT_DISPLAY_TTL: Duration = Duration::from_secs(5);

/// A cached recognition outcome for one track.
///
/// `name: None` means "crossed but unrecognized", which is still shown.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRecognition {
    /// Recognized name, if any
    pub name: Option<String>,
    /// Recognition confidence (0 when unrecognized)
    pub confidence: f64,
    /// Face box in normalized coordinates, if one was found
    pub face_bbox: Option<BoundingBox>,
    cached_at: Instant,
}

/// Display cache keyed by track id, expiring entries on read.
pub struct RecognitionCache {
    ttl: Duration,
    entries: HashMap<TrackId, CachedRecognition>,
}

impl RecognitionCache {
    /// Create a cache with the given display TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Store a recognition outcome for a track.
    pub fn insert(
        &mut self,
        track_id: TrackId,
        name: Option<String>,
        confidence: f64,
        face_bbox: Option<BoundingBox>,
    ) {
        self.insert_at(track_id, name, confidence, face_bbox, Instant::now());
    }

    /// Fetch the live entry for a track, dropping it if expired.
    pub fn get(&mut self, track_id: TrackId) -> Option<&CachedRecognition> {
        self.get_at(track_id, Instant::now())
    }

    /// Drop every expired entry, bounding the cache for long-lived tracks
    /// that never cross again.
    pub fn purge_expired(&mut self) {
        self.purge_expired_at(Instant::now());
    }

    pub(crate) fn insert_at(
        &mut self,
        track_id: TrackId,
        name: Option<String>,
        confidence: f64,
        face_bbox: Option<BoundingBox>,
        now: Instant,
    ) {
        self.entries.insert(
            track_id,
            CachedRecognition {
                name,
                confidence,
                face_bbox,
                cached_at: now,
            },
        );
    }

    pub(crate) fn get_at(&mut self, track_id: TrackId, now: Instant) -> Option<&CachedRecognition> {
        if let Some(entry) = self.entries.get(&track_id) {
            if now.duration_since(entry.cached_at) > self.ttl {
                self.entries.remove(&track_id);
                return None;
            }
        }
        self.entries.get(&track_id)
    }

    pub(crate) fn purge_expired_at(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.duration_since(entry.cached_at) <= ttl);
    }

    /// Number of cached entries, including not-yet-purged expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RecognitionCache {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_TTL)
    }
}
