// Integration tests for the blob store
// Covers sharded layout, idempotent puts and concurrent writers

use sitectl_core::digest::sha256_hex;
use sitectl_store::BlobStore;
use std::sync::Arc;
use tempfile::TempDir;

fn setup_test_blobs() -> (BlobStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp blob directory");
    (BlobStore::new(dir.path()), dir)
}

#[test]
fn test_blob_path_is_sharded_by_digest_prefix() {
    // Given: A blob store
    let (blobs, dir) = setup_test_blobs();

    // When: We write content
    let digest = blobs.write(b"<h1>hi</h1>").unwrap();

    // Then: The blob lives under <root>/<first two hex chars>/<digest>
    let expected = dir.path().join(&digest[..2]).join(&digest);
    assert_eq!(blobs.path(&digest).unwrap(), expected);
    assert!(expected.is_file());
}

#[test]
fn test_prefixed_and_bare_digests_address_the_same_blob() {
    let (blobs, _dir) = setup_test_blobs();
    let digest = blobs.write(b"body { color: red }").unwrap();

    assert_eq!(
        blobs.path(&digest).unwrap(),
        blobs.path(&format!("sha256:{}", digest)).unwrap()
    );
}

#[test]
fn test_put_under_cache_key_is_not_tied_to_content_digest() {
    // Given: A key that is not the digest of the bytes (image cache keys work this way)
    let (blobs, _dir) = setup_test_blobs();
    let key = sha256_hex(b"og-v1:card inputs");

    // When: We put image bytes under it
    blobs.put(&key, b"\x89PNG fake").unwrap();

    // Then: They read back under that key
    assert_eq!(blobs.read(&key).unwrap(), b"\x89PNG fake");
}

#[test]
fn test_concurrent_identical_puts_converge() {
    // Given: Several threads writing the same bytes
    let (blobs, _dir) = setup_test_blobs();
    let blobs = Arc::new(blobs);
    let content = b"shared asset".to_vec();

    // When: They all put at once
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let blobs = Arc::clone(&blobs);
            let content = content.clone();
            std::thread::spawn(move || blobs.write(&content))
        })
        .collect();
    let digests: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    // Then: Every writer reports the same digest and no temp files remain
    assert!(digests.iter().all(|d| d == &digests[0]));
    let shard = blobs.path(&digests[0]).unwrap();
    let leftovers: Vec<_> = std::fs::read_dir(shard.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
