use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use speakerid_kv::{KVStore, WriteBatch};
use tracing::{debug, warn};

use crate::error::{Result, SpeakerError};
use crate::identity::validate_identity;
use crate::keys;
use crate::similarity::check_vector;
use crate::types::{EnrollmentRecord, Metadata};

/// Immutable point-in-time view of every enrolled identity.
///
/// Identities iterate in lexicographic key order; samples of one identity
/// iterate in enrollment order.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    dim: Option<usize>,
    identities: BTreeMap<String, Arc<[EnrollmentRecord]>>,
}

impl Snapshot {
    /// Established embedding dimension, `None` until one is known.
    pub fn dimension(&self) -> Option<usize> {
        self.dim
    }

    /// Number of identities.
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Total number of samples across all identities.
    pub fn sample_count(&self) -> usize {
        self.identities.values().map(|r| r.len()).sum()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.identities.contains_key(identity)
    }

    pub fn get(&self, identity: &str) -> Option<&[EnrollmentRecord]> {
        self.identities.get(identity).map(|r| r.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[EnrollmentRecord])> + '_ {
        self.identities
            .iter()
            .map(|(id, records)| (id.as_str(), records.as_ref()))
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> + '_ {
        self.identities.keys().map(|id| id.as_str())
    }

    /// A snapshot holding only `identities`, with the same dimension.
    ///
    /// Fails with `NotFound` on the first identity that is not enrolled.
    pub fn subset<'a, I>(&self, identities: I) -> Result<Snapshot>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut picked = BTreeMap::new();
        for id in identities {
            let records = self
                .identities
                .get(id)
                .ok_or_else(|| SpeakerError::NotFound(id.to_string()))?;
            picked.insert(id.to_string(), Arc::clone(records));
        }
        Ok(Snapshot {
            dim: self.dim,
            identities: picked,
        })
    }
}

struct Writer {
    next_seq: u64,
    dim_persisted: bool,
}

/// Durable identity → samples mapping.
///
/// Mutations are serialized by a single writer lock and follow
/// read → build batch → persist → publish: the in-memory view only moves
/// after the backing [`KVStore`] has committed the batch. Readers clone the
/// current [`Snapshot`] handle and never wait on each other.
pub struct EmbeddingStore {
    kv: Arc<dyn KVStore>,
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<Writer>,
}

impl EmbeddingStore {
    /// Loads every record from `kv` and rebuilds the in-memory index.
    ///
    /// `dim` pins the embedding dimension up front; if the store already
    /// recorded a different one, opening fails.
    pub fn open(kv: Arc<dyn KVStore>, dim: Option<usize>) -> Result<Self> {
        let stored_dim = match kv.get(keys::DIM_KEY)? {
            Some(bytes) => Some(decode::<u64>(keys::DIM_KEY, &bytes)? as usize),
            None => None,
        };
        let mut established = match (stored_dim, dim) {
            (Some(want), Some(got)) if want != got => {
                return Err(SpeakerError::DimensionMismatch { got, want });
            }
            (Some(stored), _) => Some(stored),
            (None, configured) => configured,
        };

        let mut grouped: BTreeMap<String, Vec<EnrollmentRecord>> = BTreeMap::new();
        let mut next_seq: u64 = 1;
        for (key, value) in kv.scan(keys::RECORD_PREFIX)? {
            let record: EnrollmentRecord = decode(&key, &value)?;
            if key != keys::record_key(&record.identity, record.seq) {
                return Err(SpeakerError::Corrupt {
                    key,
                    reason: "key does not match record".to_string(),
                });
            }
            match established {
                Some(want) if record.vector.len() != want => {
                    return Err(SpeakerError::Corrupt {
                        key,
                        reason: format!("vector has {} dims, store has {want}", record.vector.len()),
                    });
                }
                Some(_) => {}
                None => established = Some(record.vector.len()),
            }
            next_seq = next_seq.max(record.seq + 1);
            // Scan order is (identity, zero-padded seq), so samples arrive in
            // enrollment order.
            grouped.entry(record.identity.clone()).or_default().push(record);
        }

        let snapshot = Snapshot {
            dim: established,
            identities: grouped
                .into_iter()
                .map(|(id, records)| (id, Arc::from(records)))
                .collect(),
        };
        debug!(
            identities = snapshot.len(),
            samples = snapshot.sample_count(),
            dim = ?snapshot.dim,
            "speakerid: store loaded"
        );

        Ok(Self {
            kv,
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(Writer {
                next_seq,
                dim_persisted: stored_dim.is_some(),
            }),
        })
    }

    /// Returns the current snapshot. Later writes do not affect it.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.current.read().dim
    }

    /// Appends a sample for `identity`, creating the identity if absent.
    ///
    /// The first sample ever stored fixes the dimension when none was
    /// configured.
    pub fn put(&self, identity: &str, vector: &[f32]) -> Result<EnrollmentRecord> {
        self.put_with_metadata(identity, vector, Metadata::new())
    }

    /// Like [`put`](Self::put), attaching `metadata` to the stored sample.
    pub fn put_with_metadata(
        &self,
        identity: &str,
        vector: &[f32],
        metadata: Metadata,
    ) -> Result<EnrollmentRecord> {
        validate_identity(identity)?;
        check_vector(vector)?;

        let mut writer = self.writer.lock();
        let current = self.snapshot();
        if let Some(want) = current.dim {
            if vector.len() != want {
                return Err(SpeakerError::DimensionMismatch {
                    got: vector.len(),
                    want,
                });
            }
        }

        let record = EnrollmentRecord {
            seq: writer.next_seq,
            identity: identity.to_string(),
            vector: vector.to_vec(),
            metadata,
            created_at: Utc::now(),
        };
        let mut batch = WriteBatch::new();
        batch.put(keys::record_key(identity, record.seq), encode(&record)?);
        if !writer.dim_persisted {
            batch.put(keys::DIM_KEY, encode(&(vector.len() as u64))?);
        }
        self.commit(&batch)?;
        writer.next_seq += 1;
        writer.dim_persisted = true;

        let mut samples = current
            .get(identity)
            .map(|records| records.to_vec())
            .unwrap_or_default();
        samples.push(record.clone());

        let mut next = Snapshot::clone(&current);
        next.dim = Some(vector.len());
        next.identities.insert(identity.to_string(), Arc::from(samples));
        self.publish(next);

        Ok(record)
    }

    /// Returns the vectors of `identity` in enrollment order.
    pub fn get_all(&self, identity: &str) -> Result<Vec<Vec<f32>>> {
        Ok(self
            .records(identity)?
            .iter()
            .map(|r| r.vector.clone())
            .collect())
    }

    /// Returns the full records of `identity` in enrollment order.
    pub fn records(&self, identity: &str) -> Result<Arc<[EnrollmentRecord]>> {
        self.current
            .read()
            .identities
            .get(identity)
            .cloned()
            .ok_or_else(|| SpeakerError::NotFound(identity.to_string()))
    }

    /// Returns every identity key, sorted.
    pub fn list_identities(&self) -> Vec<String> {
        self.current.read().identities.keys().cloned().collect()
    }

    /// Removes every sample of `identity` in one batch.
    /// Returns the number of samples removed.
    pub fn delete(&self, identity: &str) -> Result<usize> {
        validate_identity(identity)?;
        let _writer = self.writer.lock();
        let current = self.snapshot();
        let records = current
            .get(identity)
            .ok_or_else(|| SpeakerError::NotFound(identity.to_string()))?;

        let mut batch = WriteBatch::new();
        for r in records {
            batch.delete(keys::record_key(identity, r.seq));
        }
        self.commit(&batch)?;

        let removed = records.len();
        let mut next = Snapshot::clone(&current);
        next.identities.remove(identity);
        self.publish(next);
        Ok(removed)
    }

    /// Removes every sample of every identity in one batch.
    /// The established dimension is kept. Returns the number of samples removed.
    pub fn clear(&self) -> Result<usize> {
        let _writer = self.writer.lock();
        let current = self.snapshot();

        let mut batch = WriteBatch::new();
        for (identity, records) in current.iter() {
            for r in records {
                batch.delete(keys::record_key(identity, r.seq));
            }
        }
        self.commit(&batch)?;

        let removed = current.sample_count();
        self.publish(Snapshot {
            dim: current.dim,
            identities: BTreeMap::new(),
        });
        Ok(removed)
    }

    fn commit(&self, batch: &WriteBatch) -> Result<()> {
        self.kv.write(batch).map_err(|e| {
            warn!(ops = batch.len(), error = %e, "speakerid: persist failed");
            SpeakerError::from(e)
        })
    }

    fn publish(&self, next: Snapshot) {
        *self.current.write() = Arc::new(next);
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(value).map_err(|e| SpeakerError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    rmp_serde::from_slice(bytes).map_err(|e| SpeakerError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
