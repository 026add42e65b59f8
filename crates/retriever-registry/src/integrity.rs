//! Content digests recorded as script provenance.
//!
//! Every script file accepted by the loader, and every artifact fetched from
//! upstream, is fingerprinted with SHA-256 so listings can show exactly which
//! copy of a script is in use.

use sha2::{Digest, Sha256};

/// A content hash (SHA-256 hex digest).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute the SHA-256 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        ContentHash(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Get the hex string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for compact listings.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }

    /// Verify that the given data matches this hash.
    pub fn verify(&self, data: &[u8]) -> bool {
        ContentHash::compute(data) == *self
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_of_empty_input() {
        assert_eq!(
            ContentHash::compute(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn same_script_same_digest() {
        let script = br#"{"name": "iris"}"#;
        assert_eq!(ContentHash::compute(script), ContentHash::compute(script));
        assert_ne!(
            ContentHash::compute(script),
            ContentHash::compute(br#"{"name": "iris "}"#)
        );
    }

    #[test]
    fn verify_detects_edits() {
        let hash = ContentHash::compute(b"urls = 1");
        assert!(hash.verify(b"urls = 1"));
        assert!(!hash.verify(b"urls = 2"));
    }

    #[test]
    fn short_form() {
        let hash = ContentHash::compute(b"iris");
        assert_eq!(hash.short().len(), 12);
        assert!(hash.as_str().starts_with(hash.short()));
        assert_eq!(format!("{hash}").len(), 64);
    }
}
