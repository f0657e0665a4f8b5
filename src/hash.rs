//! Content hashing for change detection.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest.
pub const HASH_LEN: usize = 16;

/// Short, stable content hash: the first 16 hex chars of the SHA-256 of
/// the bytes. Hash equality is the sole change-detection signal;
/// timestamps are never consulted.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = format!("{:x}", hasher.finalize());
    digest[..HASH_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_short() {
        let a = content_hash(b"hello world");
        let b = content_hash(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_changes_with_content() {
        assert_ne!(content_hash(b"a"), content_hash(b"b"));
        assert_ne!(content_hash(b""), content_hash(b"a"));
    }
}
