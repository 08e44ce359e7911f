//! Known-subject descriptor matching.

use std::sync::RwLock;

use gatewatch_models::{Subject, SubjectId};
use tracing::info;

/// Default acceptance tolerance for descriptor distance.
pub const DEFAULT_TOLERANCE: f64 = 0.55;

/// Euclidean distance between two face descriptors.
///
/// Descriptors of mismatched length compare as infinitely far apart
/// rather than panicking.
pub fn face_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Map a descriptor distance to a display confidence in [0.5, 1.0].
///
/// [0, tolerance] maps to [1.0, 0.65] on a power-1.5 curve; distances past
/// tolerance degrade linearly with a 0.5 floor.
pub fn distance_to_confidence(distance: f64, tolerance: f64) -> f64 {
    if distance <= 0.0 {
        return 1.0;
    }
    if distance >= tolerance {
        return (1.0 - distance).max(0.5);
    }
    let ratio = distance / tolerance;
    1.0 - ratio.powf(1.5) * 0.35
}

/// A successful registry match.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectMatch {
    /// Matched subject
    pub subject_id: SubjectId,
    /// Subject display name
    pub name: String,
    /// Display confidence derived from the distance
    pub confidence: f64,
    /// Raw descriptor distance
    pub distance: f64,
}

/// Process-wide list of known subjects.
///
/// Replaced wholesale by the sync endpoint, read on every crossing. The
/// lock is held only for the distance scan; no network calls happen under
/// it.
pub struct SubjectRegistry {
    tolerance: f64,
    subjects: RwLock<Vec<Subject>>,
}

impl SubjectRegistry {
    /// Create an empty registry with the given tolerance.
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            subjects: RwLock::new(Vec::new()),
        }
    }

    /// Replace the full subject list.
    pub fn replace_all(&self, subjects: Vec<Subject>) {
        let count = subjects.len();
        let mut guard = self.subjects.write().unwrap_or_else(|e| e.into_inner());
        *guard = subjects;
        info!(count, "subject registry updated");
    }

    /// Number of registered subjects.
    pub fn len(&self) -> usize {
        self.subjects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Whether no subjects are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Match a query descriptor against every registered subject.
    ///
    /// Returns the nearest subject when its distance is within tolerance.
    pub fn match_descriptor(&self, query: &[f64]) -> Option<SubjectMatch> {
        let subjects = self.subjects.read().unwrap_or_else(|e| e.into_inner());
        if subjects.is_empty() {
            return None;
        }

        let mut best: Option<(&Subject, f64)> = None;
        for subject in subjects.iter() {
            let distance = face_distance(&subject.descriptor, query);
            match best {
                Some((_, d)) if d <= distance => {}
                _ => best = Some((subject, distance)),
            }
        }

        let (subject, distance) = best?;
        if distance > self.tolerance {
            return None;
        }

        Some(SubjectMatch {
            subject_id: subject.id.clone(),
            name: subject.name.clone(),
            confidence: distance_to_confidence(distance, self.tolerance),
            distance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(seed: f64) -> Vec<f64> {
        (0..128).map(|i| seed + i as f64 * 1e-4).collect()
    }

    #[test]
    fn test_distance_of_identical_descriptors_is_zero() {
        let d = descriptor(0.3);
        assert_eq!(face_distance(&d, &d), 0.0);
    }

    #[test]
    fn test_mismatched_lengths_never_match() {
        assert_eq!(face_distance(&[0.0; 128], &[0.0; 64]), f64::INFINITY);
    }

    #[test]
    fn test_confidence_curve_endpoints() {
        assert_eq!(distance_to_confidence(0.0, 0.55), 1.0);
        let at_tolerance = distance_to_confidence(0.55, 0.55);
        assert!((at_tolerance - 0.5).abs() < 0.06); // 1 - 0.55 floored to 0.5
        let mid = distance_to_confidence(0.275, 0.55);
        assert!(mid > 0.85 && mid < 0.95);
    }

    #[test]
    fn test_confidence_is_monotonic() {
        let mut prev = 1.0;
        for step in 1..=20 {
            let d = 0.55 * step as f64 / 20.0;
            let c = distance_to_confidence(d, 0.55);
            assert!(c <= prev, "confidence must not increase with distance");
            prev = c;
        }
    }

    #[test]
    fn test_registry_matches_nearest_within_tolerance() {
        let registry = SubjectRegistry::new(DEFAULT_TOLERANCE);
        registry.replace_all(vec![
            Subject::new("e-1", "Ada", descriptor(0.10)),
            Subject::new("e-2", "Ben", descriptor(0.50)),
        ]);

        // Slight perturbation of Ada's descriptor.
        let query = descriptor(0.11);
        let m = registry.match_descriptor(&query).expect("should match");
        assert_eq!(m.subject_id.as_str(), "e-1");
        assert_eq!(m.name, "Ada");
        assert!(m.confidence > 0.9);
    }

    #[test]
    fn test_registry_rejects_distant_query() {
        let registry = SubjectRegistry::new(DEFAULT_TOLERANCE);
        registry.replace_all(vec![Subject::new("e-1", "Ada", descriptor(0.10))]);

        // 0.9 offset over 128 dims is far outside tolerance.
        assert!(registry.match_descriptor(&descriptor(1.0)).is_none());
    }

    #[test]
    fn test_empty_registry_matches_nothing() {
        let registry = SubjectRegistry::new(DEFAULT_TOLERANCE);
        assert!(registry.match_descriptor(&descriptor(0.1)).is_none());
    }

    #[test]
    fn test_replace_all_swaps_contents() {
        let registry = SubjectRegistry::new(DEFAULT_TOLERANCE);
        registry.replace_all(vec![Subject::new("e-1", "Ada", descriptor(0.1))]);
        assert_eq!(registry.len(), 1);

        registry.replace_all(vec![
            Subject::new("e-2", "Ben", descriptor(0.2)),
            Subject::new("e-3", "Cyd", descriptor(0.3)),
        ]);
        assert_eq!(registry.len(), 2);
        let m = registry.match_descriptor(&descriptor(0.21)).expect("near Ben");
        assert_eq!(m.subject_id.as_str(), "e-2");
    }
}
