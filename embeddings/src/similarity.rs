//! Vector similarity and exact nearest-neighbour ranking.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, Result};

/// Cosine similarity in `[-1, 1]`.
///
/// A zero-magnitude vector has similarity 0.0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0_f32, 0.0_f32, 0.0_f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Cosine distance, `1 - cosine_similarity`, in the range `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    let similarity = cosine_similarity(a, b)?;
    Ok((1.0 - similarity).clamp(0.0, 2.0))
}

/// A nearest-neighbour match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// ID of the matched item.
    pub id: String,

    /// Cosine distance to the query (lower is closer).
    pub distance: f32,
}

/// Find the `n` candidates closest to `query`.
///
/// Results are ordered by ascending distance; ties are broken by id so the
/// ordering does not depend on candidate iteration order.
pub fn nearest<'a, I>(query: &[f32], candidates: I, n: usize) -> Result<Vec<Neighbor>>
where
    I: IntoIterator<Item = (&'a str, &'a [f32])>,
{
    let mut scored: Vec<(OrderedFloat<f32>, &'a str)> = Vec::new();

    for (id, embedding) in candidates {
        let distance = cosine_distance(query, embedding)?;
        scored.push((OrderedFloat(distance), id));
    }

    scored.sort();

    Ok(scored
        .into_iter()
        .take(n)
        .map(|(distance, id)| Neighbor {
            id: id.to_string(),
            distance: distance.0,
        })
        .collect())
}

/// Normalize an embedding to unit length.
pub fn normalize(embedding: &mut [f32]) {
    let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}
