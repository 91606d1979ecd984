//! Content normalization and dedup fingerprinting.
//!
//! Every write path (append and edit) calls these functions explicitly;
//! normalization is never left to a persistence hook a future caller
//! could bypass. The fingerprint is an equality key, not a secret.

use sha2::{Digest, Sha256};

/// Normalize message or title text: trim leading/trailing whitespace
/// and collapse internal whitespace runs to a single space. Absent
/// input maps to the empty string.
///
/// Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: Option<&str>) -> String {
    match text {
        None => String::new(),
        Some(s) => s.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// Compute the dedup fingerprint of already-normalized text: a
/// lowercase hex-encoded SHA-256 digest. Same normalized input always
/// yields the same fingerprint.
pub fn fingerprint(normalized: &str) -> String {
    let digest = Sha256::digest(normalized.as_bytes());
    format!("{:x}", digest)
}
