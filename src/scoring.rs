//! Distance and confidence scoring for face embeddings.
//!
//! The percentage curve is empirical: below the threshold a near-match is
//! boosted superlinearly, above it the score decays roughly linearly with
//! distance. The output is intentionally not clamped to [0, 100]; extreme
//! distances legally produce out-of-range scores and callers rely on the
//! raw value.

use crate::error::SimilarityError;

/// Length of a face embedding vector.
pub const EMBEDDING_DIM: usize = 128;

/// Distance at which two embeddings stop counting as the same identity.
pub const DISTANCE_THRESHOLD: f64 = 0.6;

/// Euclidean distance between two embedding vectors.
///
/// Both vectors must have length [`EMBEDDING_DIM`]; symmetric in its
/// arguments.
pub fn distance(v1: &[f64], v2: &[f64]) -> Result<f64, SimilarityError> {
    if v1.len() != EMBEDDING_DIM || v2.len() != EMBEDDING_DIM {
        return Err(SimilarityError::DimensionMismatch {
            expected: EMBEDDING_DIM,
            left: v1.len(),
            right: v2.len(),
        });
    }
    let sum_sq: f64 = v1
        .iter()
        .zip(v2.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum();
    Ok(sum_sq.sqrt())
}

/// Convert a face distance into a percentage confidence score.
///
/// Uses [`DISTANCE_THRESHOLD`]; see [`distance_to_percentage_with_threshold`].
pub fn distance_to_percentage(face_distance: f64) -> f64 {
    distance_to_percentage_with_threshold(face_distance, DISTANCE_THRESHOLD)
}

/// Convert a face distance into a percentage confidence score with an
/// explicit threshold.
///
/// Rounded to 2 decimal places. Not clamped: distances far past the
/// threshold yield negative scores.
pub fn distance_to_percentage_with_threshold(face_distance: f64, threshold: f64) -> f64 {
    let linear = if face_distance > threshold {
        (1.0 - face_distance) / ((1.0 - threshold) * 2.0)
    } else {
        let lin_val = 1.0 - face_distance / (threshold * 2.0);
        // lin_val >= 0.5 on this branch, so the fractional power is defined
        lin_val + (1.0 - lin_val) * ((lin_val - 0.5) * 2.0).powf(0.2)
    };
    round2(linear * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
