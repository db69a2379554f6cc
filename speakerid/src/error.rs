use speakerid_kv::KVError;
use thiserror::Error;

use crate::model::EmbedError;

/// Errors returned by speakerid operations.
#[derive(Debug, Error)]
pub enum SpeakerError {
    #[error("speakerid: identity not found: {0}")]
    NotFound(String),

    #[error("speakerid: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("speakerid: empty candidate set")]
    EmptySet,

    #[error("speakerid: invalid identity {key:?}: {reason}")]
    InvalidIdentity { key: String, reason: &'static str },

    #[error("speakerid: invalid vector: {0}")]
    InvalidVector(&'static str),

    #[error("speakerid: invalid threshold {0}: must be within [-1, 1]")]
    InvalidThreshold(f32),

    #[error("speakerid: storage: {0}")]
    Storage(#[from] KVError),

    #[error("speakerid: serialization: {0}")]
    Serialization(String),

    #[error("speakerid: corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("speakerid: embed: {0}")]
    Embed(#[from] EmbedError),
}

pub type Result<T> = std::result::Result<T, SpeakerError>;
