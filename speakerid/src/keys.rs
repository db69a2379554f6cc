//! KV key layout for the speaker store.
//!
//! ```text
//! spk:meta:dim                  → msgpack u64
//! spk:rec:{identity}:{seq}      → msgpack EnrollmentRecord
//! ```
//!
//! Identities never contain ':', so `spk:rec:{identity}:` is an exact
//! per-identity prefix.

/// KV key holding the established embedding dimension.
pub const DIM_KEY: &str = "spk:meta:dim";

/// Prefix shared by every enrollment record.
pub const RECORD_PREFIX: &str = "spk:rec:";

/// KV key for one enrollment record.
/// Sequence is zero-padded to 20 digits for correct lexicographic ordering.
pub fn record_key(identity: &str, seq: u64) -> String {
    format!("{RECORD_PREFIX}{identity}:{seq:020}")
}
