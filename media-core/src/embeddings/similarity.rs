//! Vector similarity calculations.

use crate::error::{Error, Result};

/// Cosine similarity between two vectors, in `[-1, 1]`.
///
/// Mismatched dimensions or zero-magnitude vectors yield `0.0`.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// Cosine distance, `1 - cosine_similarity`, in `[0, 2]`.
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Convert a cosine distance to a search score clamped into `[0, 1]`.
#[must_use]
pub fn distance_to_score(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Normalize a vector to unit length in place; zero vectors pass through.
#[must_use]
pub fn normalize_vector(mut vector: Vec<f32>) -> Vec<f32> {
    let magnitude = (vector.iter().map(|x| x * x).sum::<f32>()).sqrt();
    if magnitude > 0.0 {
        for x in &mut vector {
            *x /= magnitude;
        }
    }
    vector
}

/// Validate an embedding's dimension against the configured constant.
///
/// # Errors
///
/// Returns [`Error::EngineConfig`] on mismatch: a model producing the wrong
/// dimension is an engine setup problem and is quarantined, not retried.
pub fn validate_dimension(embedding: &[f32], expected: usize) -> Result<()> {
    if embedding.len() != expected {
        return Err(Error::EngineConfig(format!(
            "embedding dimension mismatch: got {}, expected {expected}",
            embedding.len()
        )));
    }
    Ok(())
}
