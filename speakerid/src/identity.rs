use crate::error::{Result, SpeakerError};

/// Longest accepted identity key, in bytes.
pub const MAX_IDENTITY_LEN: usize = 128;

/// Checks that `key` can be used as an identity.
///
/// Keys are case-sensitive and may contain any Unicode text except path
/// separators, the storage key separator `:`, and control characters.
pub fn validate_identity(key: &str) -> Result<()> {
    let reason = if key.is_empty() {
        Some("must not be empty")
    } else if key.len() > MAX_IDENTITY_LEN {
        Some("longer than 128 bytes")
    } else if key == "." || key == ".." {
        Some("reserved name")
    } else if key.trim() != key {
        Some("leading or trailing whitespace")
    } else if key.contains(['/', '\\']) {
        Some("contains a path separator")
    } else if key.contains(':') {
        Some("contains ':'")
    } else if key.chars().any(char::is_control) {
        Some("contains a control character")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SpeakerError::InvalidIdentity {
            key: key.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
