//! Face matching engine
//!
//! Classifies every roster student as PRESENT or ABSENT by the best cosine
//! similarity between their stored embedding and any face detected in the
//! lecture photos. Pure computation; nothing is persisted here.

use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{AttendanceStatus, Embedding};

/// Added to the norm product so zero vectors never divide by zero
const NORM_EPSILON: f64 = 1e-12;

/// Classification of one student
#[derive(Debug, Clone, PartialEq)]
pub struct StudentMatch {
    pub student_id: Uuid,
    pub status: AttendanceStatus,
    /// Best similarity rounded to two decimals, clamped to [0, 1]
    pub confidence: f64,
}

/// `(a·b) / (‖a‖‖b‖ + ε)`; 0 when the lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt() + NORM_EPSILON)
}

/// Round to two decimals and clamp into the stored confidence range
pub fn round_confidence(value: f64) -> f64 {
    ((value * 100.0).round() / 100.0).clamp(0.0, 1.0)
}

/// Threshold-based matcher
#[derive(Debug, Clone, Copy)]
pub struct FaceMatcher {
    threshold: f64,
}

impl FaceMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Best similarity of `stored` against any detected face
    ///
    /// `None` when nothing was detected.
    pub fn best_similarity(stored: &Embedding, detected: &[Embedding]) -> Option<f64> {
        detected
            .iter()
            .map(|face| cosine_similarity(stored.as_slice(), face.as_slice()))
            .fold(None, |best, s| Some(best.map_or(s, |b: f64| b.max(s))))
    }

    /// Classify every roster student, preserving roster order
    ///
    /// Students without a stored embedding are ABSENT with confidence 0.
    pub fn classify(
        &self,
        roster: &[Uuid],
        stored: &HashMap<Uuid, Embedding>,
        detected: &[Embedding],
    ) -> Vec<StudentMatch> {
        roster
            .iter()
            .map(|&student_id| match stored.get(&student_id) {
                Some(embedding) => {
                    let best = Self::best_similarity(embedding, detected);
                    let present = best.is_some_and(|s| s >= self.threshold);
                    StudentMatch {
                        student_id,
                        status: if present {
                            AttendanceStatus::Present
                        } else {
                            AttendanceStatus::Absent
                        },
                        confidence: best.map_or(0.0, round_confidence),
                    }
                }
                None => StudentMatch {
                    student_id,
                    status: AttendanceStatus::Absent,
                    confidence: 0.0,
                },
            })
            .collect()
    }
}

impl Default for FaceMatcher {
    fn default() -> Self {
        Self::new(0.55)
    }
}

/// Mean of per-student confidences, rounded like the individual scores
pub fn aggregate_confidence(matches: &[StudentMatch]) -> f64 {
    if matches.is_empty() {
        return 0.0;
    }
    let sum: f64 = matches.iter().map(|m| m.confidence).sum();
    round_confidence(sum / matches.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EMBEDDING_DIM;

    /// Unit vector along `axis`, tilted towards `axis + 1` by `tilt`
    fn vector(axis: usize, tilt: f32) -> Embedding {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[axis] = 1.0;
        v[axis + 1] = tilt;
        Embedding::new(v).unwrap()
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let a = vector(0, 0.0);
        let b = vector(4, 0.0);
        assert!((cosine_similarity(a.as_slice(), a.as_slice()) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(a.as_slice(), b.as_slice()), 0.0);
    }

    #[test]
    fn test_cosine_length_mismatch_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector_is_finite() {
        let zero = vec![0.0f32; 8];
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_three_student_roster() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let stored = HashMap::from([(a, vector(0, 0.0)), (b, vector(10, 0.0))]);
        // A matches exactly; B only weakly (cos ≈ 0.45)
        let detected = vec![vector(0, 0.0), vector(10, 2.0)];

        let results = FaceMatcher::default().classify(&[a, b, c], &stored, &detected);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].student_id, a);
        assert_eq!(results[0].status, AttendanceStatus::Present);
        assert_eq!(results[0].confidence, 1.0);
        assert_eq!(results[1].status, AttendanceStatus::Absent);
        assert_eq!(results[1].confidence, 0.45);
        assert_eq!(results[2].status, AttendanceStatus::Absent);
        assert_eq!(results[2].confidence, 0.0);
    }

    #[test]
    fn test_threshold_boundary() {
        let student = Uuid::new_v4();
        // cos = 1 / sqrt(1 + 0.75^2) = 0.8
        let stored = HashMap::from([(student, vector(0, 0.0))]);
        let detected = vec![vector(0, 0.75)];

        let below = FaceMatcher::new(0.79).classify(&[student], &stored, &detected);
        let above = FaceMatcher::new(0.81).classify(&[student], &stored, &detected);
        assert_eq!(below[0].status, AttendanceStatus::Present);
        assert_eq!(below[0].confidence, 0.8);
        assert_eq!(above[0].status, AttendanceStatus::Absent);
    }

    #[test]
    fn test_no_detected_faces_means_absent() {
        let student = Uuid::new_v4();
        let stored = HashMap::from([(student, vector(0, 0.0))]);
        let results = FaceMatcher::default().classify(&[student], &stored, &[]);
        assert_eq!(results[0].status, AttendanceStatus::Absent);
        assert_eq!(results[0].confidence, 0.0);
    }

    #[test]
    fn test_aggregate_confidence() {
        let m = |confidence| StudentMatch {
            student_id: Uuid::new_v4(),
            status: AttendanceStatus::Absent,
            confidence,
        };
        assert_eq!(aggregate_confidence(&[]), 0.0);
        assert_eq!(aggregate_confidence(&[m(1.0), m(0.45), m(0.0)]), 0.48);
    }
}
