//! Checksum utilities for downloaded payloads

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of an in-memory payload
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Short form of a digest for log lines
pub fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
