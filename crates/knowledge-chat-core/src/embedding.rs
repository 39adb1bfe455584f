//! Vector utilities shared by the index implementations.
//!
//! - [`cosine_distance`]: the ranking metric of every [`VectorIndex`](crate::traits::VectorIndex)
//! - [`rank_nearest`]: pick the `top_k` closest candidates in ascending distance
//! - [`check_dims`]: reject comparisons between vectors of different models
//! - [`vec_to_blob`] / [`blob_to_vec`]: little-endian `f32` BLOB encoding for SQLite

use std::cmp::Ordering;

use anyhow::{bail, Result};

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance: `1 - cosine_similarity`, in `[0.0, 2.0]`.
///
/// ```rust
/// use knowledge_chat_core::embedding::cosine_distance;
///
/// assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
/// assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
/// ```
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Fail unless a query vector and a stored vector have the same length.
///
/// A mismatch means the corpus was embedded with a different model than
/// the one answering queries; cosine distance between them is meaningless.
pub fn check_dims(query: usize, stored: usize) -> Result<()> {
    if query != stored {
        bail!(
            "Embedding dimension mismatch: query vector has {} dims but the index holds {}-dim vectors. Re-import the documents with the current embedding model.",
            query,
            stored
        );
    }
    Ok(())
}

/// Sort `(distance, item)` pairs by ascending distance and keep `top_k`.
///
/// Ties keep their insertion order, so equal-distance records come back in
/// the order they were stored.
pub fn rank_nearest<T>(mut scored: Vec<(f32, T)>, top_k: usize) -> Vec<(f32, T)> {
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    scored
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`]. Trailing partial bytes are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
