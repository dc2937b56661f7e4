// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Image/text similarity from joint embeddings.

use super::{Embeddings, InferenceError};

/// Cosine similarity of the L2-normalised embeddings, in [-1, 1].
pub fn cosine_similarity(embeddings: &Embeddings) -> Result<f64, InferenceError> {
    let (a, b) = (&embeddings.image, &embeddings.text);
    if a.is_empty() || a.len() != b.len() {
        return Err(InferenceError::MalformedOutput(format!(
            "Embedding dimensions differ ({} vs {})",
            a.len(),
            b.len()
        )));
    }

    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 || !norm_a.is_finite() || !norm_b.is_finite() {
        return Err(InferenceError::MalformedOutput(
            "Embedding has zero or non-finite norm".to_string(),
        ));
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| (x / norm_a) * (y / norm_b)).sum();
    Ok(dot.clamp(-1.0, 1.0))
}
