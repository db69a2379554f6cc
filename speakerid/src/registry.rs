use std::sync::Arc;

use speakerid_kv::{KVStore, MemoryStore};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, SpeakerError};
use crate::identity::validate_identity;
use crate::matcher::{Matcher, check_threshold};
use crate::model::Embedder;
use crate::store::{EmbeddingStore, Snapshot};
use crate::types::{Candidate, EnrollmentRecord, IdentityStats, MatchResult, Metadata, Stats};

/// Enrolled speakers and the operations over them.
///
/// Every write goes through the registry and the [`EmbeddingStore`] below
/// it, which rejects malformed identity keys. Reads work on a fresh
/// snapshot per call. Thread-safe: all methods can be called concurrently.
pub struct Registry {
    cfg: Config,
    store: EmbeddingStore,
    matcher: Matcher,
}

impl Registry {
    /// Opens a registry over `kv`, loading every stored sample.
    pub fn open(cfg: Config, kv: Arc<dyn KVStore>) -> Result<Self> {
        check_threshold(cfg.threshold())?;
        let store = EmbeddingStore::open(kv, cfg.fixed_dim())?;
        let matcher = Matcher::new(cfg.aggregation);
        Ok(Self {
            cfg,
            store,
            matcher,
        })
    }

    /// Creates a registry backed by an empty in-memory store.
    pub fn in_memory(cfg: Config) -> Result<Self> {
        Self::open(cfg, Arc::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Adds one sample for `identity`. The first sample creates the identity;
    /// later ones are kept alongside it.
    pub fn enroll(&self, identity: &str, vector: &[f32]) -> Result<EnrollmentRecord> {
        self.enroll_with_metadata(identity, vector, Metadata::new())
    }

    /// Like [`enroll`](Self::enroll), labelling the sample with `metadata`.
    pub fn enroll_with_metadata(
        &self,
        identity: &str,
        vector: &[f32],
        metadata: Metadata,
    ) -> Result<EnrollmentRecord> {
        let record = self.store.put_with_metadata(identity, vector, metadata)?;
        info!(identity, seq = record.seq, "speakerid: enrolled sample");
        Ok(record)
    }

    /// Embeds `audio` with `embedder` and enrolls the result.
    pub fn enroll_audio(
        &self,
        identity: &str,
        audio: &[u8],
        embedder: &dyn Embedder,
    ) -> Result<EnrollmentRecord> {
        validate_identity(identity)?;
        self.check_embedder(embedder)?;
        let vector = embedder.embed(audio)?;
        self.enroll(identity, &vector)
    }

    /// Removes `identity` with all its samples.
    /// Returns the number of samples removed.
    pub fn unenroll(&self, identity: &str) -> Result<usize> {
        let removed = self.store.delete(identity)?;
        info!(identity, removed, "speakerid: unenrolled");
        Ok(removed)
    }

    /// All enrolled identity keys, sorted.
    pub fn list(&self) -> Vec<String> {
        self.store.list_identities()
    }

    /// Vectors of `identity` in enrollment order.
    pub fn samples(&self, identity: &str) -> Result<Vec<Vec<f32>>> {
        self.store.get_all(identity)
    }

    pub fn records(&self, identity: &str) -> Result<Arc<[EnrollmentRecord]>> {
        self.store.records(identity)
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.snapshot()
    }

    /// 1:N identification. `threshold` defaults to the configured one.
    pub fn identify(&self, query: &[f32], threshold: Option<f32>) -> Result<MatchResult> {
        let threshold = self.threshold(threshold);
        let snapshot = self.store.snapshot();
        let result = self.matcher.identify(query, threshold, &snapshot)?;
        debug!(
            identity = ?result.identity,
            score = result.score,
            accepted = result.accepted,
            threshold,
            candidates = snapshot.len(),
            "speakerid: identify"
        );
        Ok(result)
    }

    /// 1:N identification restricted to `identities`.
    ///
    /// Every listed identity must be enrolled. An empty list matches nothing.
    pub fn identify_among(
        &self,
        query: &[f32],
        identities: &[&str],
        threshold: Option<f32>,
    ) -> Result<MatchResult> {
        for id in identities {
            validate_identity(id)?;
        }
        let threshold = self.threshold(threshold);
        let scoped = self.store.snapshot().subset(identities.iter().copied())?;
        let result = self.matcher.identify(query, threshold, &scoped)?;
        debug!(
            identity = ?result.identity,
            score = result.score,
            accepted = result.accepted,
            threshold,
            candidates = scoped.len(),
            "speakerid: identify among"
        );
        Ok(result)
    }

    /// Embeds `audio` with `embedder` and identifies the result.
    pub fn identify_audio(
        &self,
        audio: &[u8],
        embedder: &dyn Embedder,
        threshold: Option<f32>,
    ) -> Result<MatchResult> {
        self.check_embedder(embedder)?;
        let query = embedder.embed(audio)?;
        self.identify(&query, threshold)
    }

    /// 1:1 verification: does `query` belong to `identity`?
    pub fn verify(&self, identity: &str, query: &[f32], threshold: Option<f32>) -> Result<MatchResult> {
        validate_identity(identity)?;
        let threshold = self.threshold(threshold);
        let records = self.store.records(identity)?;
        let mut result = self.matcher.verify(query, &records[..], threshold)?;
        if result.accepted {
            result.identity = Some(identity.to_string());
        }
        debug!(identity, score = result.score, accepted = result.accepted, threshold, "speakerid: verify");
        Ok(result)
    }

    /// Pairwise comparison, independent of enrolled identities.
    pub fn compare(&self, v1: &[f32], v2: &[f32], threshold: Option<f32>) -> Result<MatchResult> {
        self.matcher.compare(v1, v2, self.threshold(threshold))
    }

    /// Best `top_k` identities for `query`, highest score first.
    pub fn rank(&self, query: &[f32], top_k: usize) -> Result<Vec<Candidate>> {
        self.matcher.rank(query, &self.store.snapshot(), top_k)
    }

    pub fn stats(&self) -> Stats {
        let snapshot = self.store.snapshot();
        Stats {
            identities: snapshot.len(),
            samples: snapshot.sample_count(),
            dimension: snapshot.dimension(),
        }
    }

    pub fn identity_stats(&self, identity: &str) -> Result<IdentityStats> {
        let records = self.store.records(identity)?;
        let (first, last) = match (records.first(), records.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(SpeakerError::NotFound(identity.to_string())),
        };
        Ok(IdentityStats {
            identity: identity.to_string(),
            samples: records.len(),
            first_enrolled: first.created_at,
            last_enrolled: last.created_at,
        })
    }

    /// Removes every identity. Returns the number of samples removed.
    pub fn clear(&self) -> Result<usize> {
        let removed = self.store.clear()?;
        info!(removed, "speakerid: cleared all identities");
        Ok(removed)
    }

    /// Rejects an embedder whose output cannot match the stored dimension,
    /// before any audio is processed.
    fn check_embedder(&self, embedder: &dyn Embedder) -> Result<()> {
        match self.store.dimension() {
            Some(want) if embedder.dimension() != want => Err(SpeakerError::DimensionMismatch {
                got: embedder.dimension(),
                want,
            }),
            _ => Ok(()),
        }
    }

    fn threshold(&self, threshold: Option<f32>) -> f32 {
        threshold.unwrap_or_else(|| self.cfg.threshold())
    }
}
