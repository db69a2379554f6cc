//! Identification (1:N), verification (1:1) and pairwise comparison.
//!
//! The matcher never touches storage. It scans whatever [`Snapshot`] it is
//! handed, so a scan is consistent even while enrollments continue.
//!
//! Acceptance is `score >= threshold`. Identities are scanned in
//! lexicographic key order and only a strictly greater score replaces the
//! current best, so on an exact tie the smallest key wins.

use crate::error::{Result, SpeakerError};
use crate::similarity::{self, Aggregation, NO_MATCH, check_vector};
use crate::store::Snapshot;
use crate::types::{Candidate, EnrollmentRecord, MatchResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher {
    aggregation: Aggregation,
}

impl Matcher {
    pub fn new(aggregation: Aggregation) -> Self {
        Self { aggregation }
    }

    /// Finds the enrolled identity that best matches `query`.
    ///
    /// An empty snapshot yields a rejected result with score `-1.0`.
    pub fn identify(&self, query: &[f32], threshold: f32, snapshot: &Snapshot) -> Result<MatchResult> {
        check_threshold(threshold)?;
        if snapshot.is_empty() {
            return Ok(MatchResult::rejected(NO_MATCH));
        }
        check_query(query, snapshot)?;

        let mut best: Option<Candidate> = None;
        for (identity, records) in snapshot.iter() {
            let candidate = self.score_identity(identity, records, query)?;
            let better = match &best {
                Some(b) => candidate.score > b.score,
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        }

        Ok(match best {
            Some(c) => decide(Some(c.identity), c.score, c.sample, threshold),
            None => MatchResult::rejected(NO_MATCH),
        })
    }

    /// Checks `query` against one identity's samples.
    ///
    /// The result carries no identity; callers that know whose samples these
    /// are fill it in.
    pub fn verify(
        &self,
        query: &[f32],
        target_vectors: &[impl AsRef<[f32]>],
        threshold: f32,
    ) -> Result<MatchResult> {
        check_threshold(threshold)?;
        check_vector(query)?;
        let (score, _) = similarity::aggregate(target_vectors, query, self.aggregation)?;
        Ok(decide(None, score, None, threshold))
    }

    /// Compares two embeddings directly.
    pub fn compare(&self, v1: &[f32], v2: &[f32], threshold: f32) -> Result<MatchResult> {
        check_threshold(threshold)?;
        check_vector(v1)?;
        check_vector(v2)?;
        let score = similarity::score(v1, v2)?;
        Ok(decide(None, score, None, threshold))
    }

    /// Returns up to `top_k` identities ordered by descending score.
    /// Equal scores keep lexicographic key order.
    pub fn rank(&self, query: &[f32], snapshot: &Snapshot, top_k: usize) -> Result<Vec<Candidate>> {
        if snapshot.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        check_query(query, snapshot)?;

        let mut candidates = snapshot
            .iter()
            .map(|(identity, records)| self.score_identity(identity, records, query))
            .collect::<Result<Vec<_>>>()?;
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(top_k);
        Ok(candidates)
    }

    fn score_identity(
        &self,
        identity: &str,
        records: &[EnrollmentRecord],
        query: &[f32],
    ) -> Result<Candidate> {
        let (score, idx) = similarity::aggregate(records, query, self.aggregation)?;
        Ok(Candidate {
            identity: identity.to_string(),
            score,
            sample: idx.map(|i| records[i].seq),
        })
    }
}

/// Rejects thresholds that are NaN or outside `[-1, 1]`.
pub fn check_threshold(threshold: f32) -> Result<()> {
    if (-1.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(SpeakerError::InvalidThreshold(threshold))
    }
}

fn check_query(query: &[f32], snapshot: &Snapshot) -> Result<()> {
    check_vector(query)?;
    match snapshot.dimension() {
        Some(want) if query.len() != want => Err(SpeakerError::DimensionMismatch {
            got: query.len(),
            want,
        }),
        _ => Ok(()),
    }
}

fn decide(identity: Option<String>, score: f32, sample: Option<u64>, threshold: f32) -> MatchResult {
    if score >= threshold {
        MatchResult {
            identity,
            score,
            accepted: true,
            sample,
        }
    } else {
        MatchResult::rejected(score)
    }
}
