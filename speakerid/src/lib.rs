//! Speaker identification over enrolled voice embeddings.
//!
//! # Architecture
//!
//! ```text
//! audio --Embedder--> vector --Registry::enroll--> EmbeddingStore --> KVStore
//!                       |
//!                       +--Registry::identify--> Matcher (scans a Snapshot)
//! ```
//!
//! - [`Registry`]: the entry point. Resolves the
//!   default threshold and logs each operation.
//! - [`EmbeddingStore`]: in-memory index of every sample, persisted through
//!   a [`speakerid_kv::KVStore`]. Writes are serialized and committed to the
//!   store before they become visible. Readers get an immutable
//!   [`Snapshot`] and never block a writer.
//! - [`Matcher`]: 1:N identification, 1:1 verification, pairwise
//!   comparison and ranking. Pure functions of a snapshot.
//!
//! # Scoring
//!
//! Cosine similarity in `[-1, 1]`, see [`score`]. An identity with several
//! samples scores as its best sample by default ([`Aggregation::Max`]).
//! A match is accepted when `score >= threshold`.
//!
//! # Example
//!
//! ```
//! use speakerid::{Config, Registry};
//!
//! let reg = Registry::in_memory(Config::default()).unwrap();
//! reg.enroll("alice", &[1.0, 0.0, 0.0]).unwrap();
//! reg.enroll("bob", &[0.0, 1.0, 0.0]).unwrap();
//!
//! let m = reg.identify(&[0.9, 0.1, 0.0], Some(0.8)).unwrap();
//! assert_eq!(m.identity.as_deref(), Some("alice"));
//! assert!(m.accepted);
//! ```

mod config;
mod error;
mod identity;
mod keys;
mod matcher;
mod model;
mod registry;
mod similarity;
mod store;
mod types;

pub use config::{Config, DEFAULT_THRESHOLD};
pub use error::{Result, SpeakerError};
pub use identity::{MAX_IDENTITY_LEN, validate_identity};
pub use matcher::{Matcher, check_threshold};
pub use model::{EmbedError, Embedder};
pub use registry::Registry;
pub use similarity::{Aggregation, NO_MATCH, aggregate, best_score, l2_normalize, score};
pub use store::{EmbeddingStore, Snapshot};
pub use types::{Candidate, EnrollmentRecord, IdentityStats, MatchResult, Metadata, Stats};

#[cfg(test)]
mod tests;
