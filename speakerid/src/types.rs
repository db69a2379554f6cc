use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-supplied key/value labels attached to a sample.
pub type Metadata = BTreeMap<String, String>;

/// One enrolled voice sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    /// Store-wide sequence number, unique and increasing.
    pub seq: u64,

    /// Owning identity key.
    pub identity: String,

    /// Embedding as produced by the model (not normalized).
    pub vector: Vec<f32>,

    /// Free-form labels supplied at enrollment (e.g. `relationship`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,

    pub created_at: DateTime<Utc>,
}

impl AsRef<[f32]> for EnrollmentRecord {
    fn as_ref(&self) -> &[f32] {
        &self.vector
    }
}

/// Outcome of an identification, verification or comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Matched identity. `None` when rejected or when no identity applies
    /// (pairwise compare).
    pub identity: Option<String>,

    /// Best similarity found, `-1.0` when there was nothing to compare.
    pub score: f32,

    /// Whether `score >= threshold`.
    pub accepted: bool,

    /// Sequence of the sample that produced `score` under max aggregation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<u64>,
}

impl MatchResult {
    pub(crate) fn rejected(score: f32) -> Self {
        Self {
            identity: None,
            score,
            accepted: false,
            sample: None,
        }
    }
}

/// One entry of a ranked identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub identity: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<u64>,
}

/// Store-wide counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub identities: usize,
    pub samples: usize,
    pub dimension: Option<usize>,
}

/// Counters for one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityStats {
    pub identity: String,
    pub samples: usize,
    pub first_enrolled: DateTime<Utc>,
    pub last_enrolled: DateTime<Utc>,
}
