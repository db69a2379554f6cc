//! Cosine similarity between embeddings.
//!
//! Scores lie in `[-1, 1]`. Both inputs are L2-normalized internally, so
//! callers may pass raw model output. A vector with zero norm has no
//! direction and scores exactly `-1.0` against anything.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpeakerError};

/// Score assigned when either side of a comparison has zero norm.
pub const NO_MATCH: f32 = -1.0;

/// How per-sample scores of one identity are folded into a single score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Best single sample. Favors recall with many enrollment samples.
    #[default]
    Max,
    /// Average over all samples.
    Mean,
}

/// Cosine similarity between `a` and `b`.
///
/// Uses f64 accumulation and clamps the result to `[-1, 1]`.
pub fn score(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(SpeakerError::DimensionMismatch {
            got: b.len(),
            want: a.len(),
        });
    }

    let mut dot: f64 = 0.0;
    let mut norm_a: f64 = 0.0;
    let mut norm_b: f64 = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        let x = x as f64;
        let y = y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(NO_MATCH);
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(similarity.clamp(-1.0, 1.0) as f32)
}

/// Highest score of `query` against any of `vectors`.
pub fn best_score<V: AsRef<[f32]>>(vectors: &[V], query: &[f32]) -> Result<f32> {
    aggregate(vectors, query, Aggregation::Max).map(|(s, _)| s)
}

/// Folds the scores of `query` against `vectors` with `aggregation`.
///
/// Returns the score and, for [`Aggregation::Max`], the index of the sample
/// that produced it. Equal scores keep the earliest sample.
pub fn aggregate<V: AsRef<[f32]>>(
    vectors: &[V],
    query: &[f32],
    aggregation: Aggregation,
) -> Result<(f32, Option<usize>)> {
    if vectors.is_empty() {
        return Err(SpeakerError::EmptySet);
    }

    match aggregation {
        Aggregation::Max => {
            let mut best = f32::NEG_INFINITY;
            let mut best_idx = 0;
            for (i, v) in vectors.iter().enumerate() {
                let s = score(v.as_ref(), query)?;
                if s > best {
                    best = s;
                    best_idx = i;
                }
            }
            Ok((best, Some(best_idx)))
        }
        Aggregation::Mean => {
            let mut sum: f64 = 0.0;
            for v in vectors {
                sum += score(v.as_ref(), query)? as f64;
            }
            Ok(((sum / vectors.len() as f64) as f32, None))
        }
    }
}

/// Rejects vectors that cannot be stored or scored.
pub(crate) fn check_vector(vector: &[f32]) -> Result<()> {
    if vector.is_empty() {
        return Err(SpeakerError::InvalidVector("empty vector"));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(SpeakerError::InvalidVector("non-finite component"));
    }
    Ok(())
}

/// Scales `v` to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm == 0.0 {
        return;
    }
    for x in v.iter_mut() {
        *x = (*x as f64 / norm) as f32;
    }
}
