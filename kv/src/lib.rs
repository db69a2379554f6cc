//! Key-value storage backends for the speaker store.
//!
//! Keys are UTF-8 strings and values are opaque bytes. Every mutation goes
//! through a [`WriteBatch`], which a backend applies atomically: either all
//! of its operations become durable or none do.

pub mod memory;
pub mod redb_store;

use std::fmt;
use thiserror::Error;

/// Errors that can occur in KV store operations.
#[derive(Error, Debug)]
pub enum KVError {
    #[error("kv: storage error: {0}")]
    Storage(String),

    #[error("kv: store is read-only")]
    ReadOnly,
}

/// Result type for KV operations.
pub type KVResult<T> = Result<T, KVError>;

/// A single mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

/// An ordered group of mutations applied in one transaction.
///
/// Later operations on the same key win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<Op>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(Op::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(Op::Delete { key: key.into() });
        self
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Key-value store trait.
///
/// Implementations must be safe for concurrent use. `write` must be atomic
/// with respect to crashes and to concurrent readers.
pub trait KVStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>>;

    /// Return all entries whose key starts with `prefix`, sorted by key.
    fn scan(&self, prefix: &str) -> KVResult<Vec<(String, Vec<u8>)>>;

    /// Apply every operation in `batch` in a single transaction.
    fn write(&self, batch: &WriteBatch) -> KVResult<()>;

    /// Set a single key.
    fn set(&self, key: &str, value: &[u8]) -> KVResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(&batch)
    }

    /// Delete a single key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> KVResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(&batch)
    }
}

impl fmt::Debug for dyn KVStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KVStore {{ ... }}")
    }
}

pub use memory::MemoryStore;
pub use redb_store::RedbStore;
