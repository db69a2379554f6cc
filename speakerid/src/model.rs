use thiserror::Error;

/// Errors reported by an [`Embedder`].
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("audio too short: need at least {min_bytes} bytes, got {got_bytes}")]
    AudioTooShort { min_bytes: usize, got_bytes: usize },

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("model error: {0}")]
    Model(String),
}

/// Extracts speaker embedding vectors from decoded audio.
///
/// The registry never inspects audio itself. Decoding, resampling and
/// channel mixing happen before `embed` is called; implementations define
/// which PCM layout they accept (typically PCM16 little-endian, 16kHz,
/// mono) and report anything else as [`EmbedError::UnsupportedFormat`].
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use.
pub trait Embedder: Send + Sync {
    /// Computes a speaker embedding from decoded audio.
    fn embed(&self, audio: &[u8]) -> Result<Vec<f32>, EmbedError>;

    /// Returns the dimensionality of the embedding vectors (e.g., 192).
    fn dimension(&self) -> usize;
}
