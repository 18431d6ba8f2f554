#![allow(clippy::result_large_err)]

use crate::cas::atomic::atomic_write;
use crate::cas::sharding::shard_path;
use crate::errors::{blob_missing, invalid_digest, io_error, Result};
use sitectl_core::digest::{hash_hex, sha256_hex};
use sitectl_core::errors::{SiteError, SiteErrorKind};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Filesystem blob store keyed by SHA-256 hex digests
///
/// Keys may be passed bare or as `sha256:<hex>`. The store does not require
/// the key to be the digest of the bytes: generated images are stored under
/// a cache key derived from their inputs.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key(&self, digest: &str) -> Result<String> {
        hash_hex(digest).map_err(|_| invalid_digest(digest))
    }

    /// Path where the blob for `digest` lives (whether or not it exists)
    pub fn path(&self, digest: &str) -> Result<PathBuf> {
        Ok(shard_path(&self.root, &self.key(digest)?))
    }

    pub fn exists(&self, digest: &str) -> Result<bool> {
        Ok(self.path(digest)?.is_file())
    }

    /// Store `content` under `digest`.
    ///
    /// Re-putting identical bytes is a no-op. Putting different bytes under
    /// an existing key fails rather than silently replacing the blob.
    pub fn put(&self, digest: &str, content: &[u8]) -> Result<()> {
        let target = self.path(digest)?;
        match fs::read(&target) {
            Ok(existing) if existing == content => return Ok(()),
            Ok(_) => {
                return Err(SiteError::new(SiteErrorKind::IntegrityViolation)
                    .with_op("blob_put")
                    .with_message(format!("blob collision for digest {}", digest)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error("blob_read_existing", e)),
        }
        atomic_write(&target, content)
    }

    /// Store `content` under its own digest and return the hex digest
    pub fn write(&self, content: &[u8]) -> Result<String> {
        let digest = sha256_hex(content);
        self.put(&digest, content)?;
        Ok(digest)
    }

    /// Bytes stored under `digest`. Not re-hashed: keys that are not
    /// content digests (og image cache keys) are read through here too.
    pub fn read(&self, digest: &str) -> Result<Vec<u8>> {
        let path = self.path(digest)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => blob_missing(digest),
            _ => io_error("blob_read", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_blobs() -> (BlobStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let blobs = BlobStore::new(temp_dir.path());
        (blobs, temp_dir)
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (blobs, _dir) = setup_test_blobs();

        let digest = blobs.write(b"Hello, blobs!").unwrap();

        assert_eq!(blobs.read(&digest).unwrap(), b"Hello, blobs!");
        assert_eq!(blobs.read(&format!("sha256:{}", digest)).unwrap(), b"Hello, blobs!");
    }

    #[test]
    fn test_read_returns_bytes_stored_under_cache_key() {
        // Given: Bytes stored under a key that is not their digest
        let (blobs, _dir) = setup_test_blobs();
        let key = sha256_hex(b"og card: home");

        // When: The key is read back
        blobs.put(&key, b"png bytes").unwrap();

        // Then: The stored bytes come back as-is
        assert_eq!(blobs.read(&key).unwrap(), b"png bytes");
        assert_ne!(sha256_hex(b"png bytes"), key);
    }

    #[test]
    fn test_put_is_idempotent() {
        let (blobs, _dir) = setup_test_blobs();
        let digest = sha256_hex(b"same");

        blobs.put(&digest, b"same").unwrap();
        blobs.put(&digest, b"same").unwrap();

        assert!(blobs.exists(&digest).unwrap());
    }

    #[test]
    fn test_put_rejects_collision() {
        let (blobs, _dir) = setup_test_blobs();
        let digest = sha256_hex(b"first");

        blobs.put(&digest, b"first").unwrap();
        let err = blobs.put(&digest, b"second").unwrap_err();

        assert_eq!(err.kind(), SiteErrorKind::IntegrityViolation);
        assert_eq!(blobs.read(&digest).unwrap(), b"first");
    }

    #[test]
    fn test_read_missing() {
        let (blobs, _dir) = setup_test_blobs();
        let err = blobs.read(&"0".repeat(64)).unwrap_err();
        assert_eq!(err.kind(), SiteErrorKind::NotFound);
    }

    #[test]
    fn test_invalid_digest_rejected() {
        let (blobs, _dir) = setup_test_blobs();
        assert!(blobs.path("../../etc/passwd").is_err());
        assert!(blobs.put("abc", b"x").is_err());
    }
}
