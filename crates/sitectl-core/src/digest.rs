//! SHA-256 digests in their canonical textual forms

use crate::errors::ValidationError;
use sha2::{Digest, Sha256};

pub const HASH_PREFIX: &str = "sha256:";

/// Lowercase hex SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// `sha256:<hex>` of `bytes`
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{}{}", HASH_PREFIX, sha256_hex(bytes))
}

/// True for exactly 64 lowercase hex characters
pub fn is_hex_digest(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Normalize a declared hash (with or without prefix) to `sha256:<hex>`
pub fn canonical_hash(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    let hex_part = trimmed.strip_prefix(HASH_PREFIX).unwrap_or(trimmed);
    if !is_hex_digest(hex_part) {
        return Err(ValidationError::InvalidHash {
            hash: value.to_string(),
        });
    }
    Ok(format!("{}{}", HASH_PREFIX, hex_part))
}

/// Blob key (bare hex) for a canonical or bare hash
pub fn hash_hex(value: &str) -> Result<String, ValidationError> {
    canonical_hash(value).map(|h| h[HASH_PREFIX.len()..].to_string())
}
