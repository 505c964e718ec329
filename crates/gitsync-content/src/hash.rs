//! Content fingerprints
//!
//! A single canonical fingerprint format (`sha256:<hex>`) computed over the raw
//! bytes of a file as it is stored in the repository. Fingerprints are only
//! compared for equality to detect change.

use sha2::{Digest, Sha256};

/// Prefix for all fingerprints produced by this module
const PREFIX: &str = "sha256:";

/// Compute the fingerprint of raw external text.
///
/// Returns a string in the canonical format `"sha256:<hex>"`. The empty string
/// is never a valid fingerprint, so callers may use it as a "no content"
/// marker.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{}{:x}", PREFIX, hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_has_prefix() {
        assert!(content_hash("hello world").starts_with("sha256:"));
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(content_hash("# A"), content_hash("# A"));
    }

    #[test]
    fn different_text_different_hash() {
        assert_ne!(content_hash("# A"), content_hash("# A\n"));
    }

    #[test]
    fn hash_known_value() {
        assert_eq!(
            content_hash("hello world"),
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn empty_text_hash_is_not_empty() {
        assert!(!content_hash("").is_empty());
    }
}
