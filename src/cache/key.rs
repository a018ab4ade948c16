//! Cache key derivation

use sha2::{Digest, Sha256};

/// Derive a cache key from free text
///
/// Text is trimmed and lowercased before hashing, so inputs differing only
/// in surrounding whitespace or letter case share a key. Inner whitespace is
/// kept as-is.
pub fn generate_key(text: &str) -> String {
    let normalized = text.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}
