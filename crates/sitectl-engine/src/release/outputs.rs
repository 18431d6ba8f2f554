//! Release metadata files and output hashing

use crate::release::fsutil::{io_at, write_file};
use sha2::{Digest, Sha256};
use sitectl_core::digest::{content_hash, HASH_PREFIX};
use sitectl_core::errors::{Result, SiteError, SiteErrorKind};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

pub const MANIFEST_FILE: &str = ".manifest.json";
pub const BUILD_LOG_FILE: &str = ".build-log.txt";
pub const OUTPUT_HASHES_FILE: &str = ".output-hashes.json";

/// Path → `sha256:<hex>` for every file in a release tree
pub type OutputHashes = BTreeMap<String, String>;

pub fn is_release_metadata_file(rel: &str) -> bool {
    matches!(rel, MANIFEST_FILE | BUILD_LOG_FILE | OUTPUT_HASHES_FILE)
}

/// Hash every non-directory entry under `root`, metadata files excluded.
/// Symlinks are hashed by the bytes they resolve to.
pub fn compute_output_hashes(root: &Path) -> Result<OutputHashes> {
    let mut hashes = OutputHashes::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            SiteError::new(SiteErrorKind::Io)
                .with_op("hash_outputs")
                .with_path(root.display().to_string())
                .with_message(e.to_string())
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| SiteError::internal(e.to_string()).with_op("hash_outputs"))?
            .to_string_lossy()
            .replace('\\', "/");
        if is_release_metadata_file(&rel) {
            continue;
        }
        let bytes = fs::read(entry.path()).map_err(|e| io_at("hash_outputs", entry.path(), e))?;
        hashes.insert(rel, content_hash(&bytes));
    }
    Ok(hashes)
}

/// Parse a stored output-hash map, dropping metadata paths and blank keys
pub fn parse_output_hashes(raw: &str) -> Result<OutputHashes> {
    if raw.trim().is_empty() {
        return Ok(OutputHashes::new());
    }
    let parsed: OutputHashes = serde_json::from_str(raw)?;
    Ok(parsed
        .into_iter()
        .map(|(path, hash)| (path.trim().replace('\\', "/"), hash.trim().to_string()))
        .filter(|(path, _)| !path.is_empty() && !is_release_metadata_file(path))
        .collect())
}

/// Digest of a whole tree: SHA-256 over `path\ndigest\n` in path order
pub fn tree_digest(hashes: &OutputHashes) -> String {
    let mut hasher = Sha256::new();
    for (path, digest) in hashes {
        hasher.update(path.as_bytes());
        hasher.update(b"\n");
        hasher.update(digest.as_bytes());
        hasher.update(b"\n");
    }
    format!("{}{}", HASH_PREFIX, hex::encode(hasher.finalize()))
}

/// First difference between two hash maps, if any
pub fn compare_hashes(source: &OutputHashes, target: &OutputHashes) -> Option<String> {
    for (path, source_hash) in source {
        match target.get(path) {
            None => return Some(format!("target is missing file {}", path)),
            Some(target_hash) if target_hash != source_hash => {
                return Some(format!("hash mismatch for {}", path))
            }
            Some(_) => {}
        }
    }
    target
        .keys()
        .find(|path| !source.contains_key(*path))
        .map(|path| format!("target has unexpected file {}", path))
}

/// Write the three metadata files into `release_dir`; returns the
/// serialized hash map as stored in the release row
pub fn write_release_metadata(
    release_dir: &Path,
    manifest_json: &str,
    build_log: &str,
    hashes: &OutputHashes,
) -> Result<String> {
    let hashes_json = serde_json::to_string_pretty(hashes)?;
    write_file(&release_dir.join(MANIFEST_FILE), manifest_json.as_bytes())?;
    write_file(&release_dir.join(BUILD_LOG_FILE), build_log.as_bytes())?;
    write_file(&release_dir.join(OUTPUT_HASHES_FILE), hashes_json.as_bytes())?;
    Ok(hashes_json)
}
