//! In-memory key-value store for tests and ephemeral registries.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{KVError, KVResult, KVStore, Op, WriteBatch};

/// An in-memory key-value store backed by a sorted map.
///
/// Clones share the same underlying data, so a test can keep a handle to
/// inspect what a store wrote or to reopen a store over the same contents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    read_only: bool,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a handle over the same data that rejects every write.
    pub fn read_only(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            read_only: true,
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KVStore for MemoryStore {
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn scan(&self, prefix: &str) -> KVResult<Vec<(String, Vec<u8>)>> {
        let data = self.data.read();
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write(&self, batch: &WriteBatch) -> KVResult<()> {
        if self.read_only {
            return Err(KVError::ReadOnly);
        }
        let mut data = self.data.write();
        for op in batch.ops() {
            match op {
                Op::Put { key, value } => {
                    data.insert(key.clone(), value.clone());
                }
                Op::Delete { key } => {
                    data.remove(key);
                }
            }
        }
        Ok(())
    }
}
