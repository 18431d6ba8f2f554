//! Resource bundles pushed by producers
//!
//! A bundle is a manifest plus the bytes of every file it references.
//! [`Manifest::resolve`] turns the loosely typed wire form into
//! [`ResourceEntry`] values with one variant per resource kind.

pub mod manifest;
pub mod resource;

pub use manifest::{ApplyMode, FileDescriptor, Manifest, ResourceDescriptor};
pub use resource::{infer_content_type, FileRef, ResourceEntry, ResourceKind, ResourceSpec};

use crate::errors::{Result, SiteError, SiteErrorKind};
use crate::names::sanitize_rel_path;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone)]
pub struct Bundle {
    pub manifest: Manifest,
    files: BTreeMap<String, Vec<u8>>,
}

impl Bundle {
    /// File keys are normalized the same way resource paths are, so
    /// `./pages/home.page.yaml` and `pages/home.page.yaml` address one entry.
    pub fn new(manifest: Manifest, files: BTreeMap<String, Vec<u8>>) -> Self {
        let files = files
            .into_iter()
            .map(|(path, bytes)| (sanitize_rel_path(&path).unwrap_or(path), bytes))
            .collect();
        Self { manifest, files }
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Load `manifest.json` from `dir` and every file it references.
    ///
    /// Referenced files that do not exist are left out; applying the bundle
    /// then fails with a missing-file validation error.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let raw = fs::read(&manifest_path).map_err(|e| {
            SiteError::from(e)
                .with_op("load_bundle")
                .with_path(manifest_path.display().to_string())
        })?;
        let manifest = Manifest::from_json(&raw).map_err(|e| {
            SiteError::new(SiteErrorKind::InvalidInput)
                .with_op("load_bundle")
                .with_message(format!("parse {}: {}", MANIFEST_FILE, e))
        })?;

        let mut files = BTreeMap::new();
        for descriptor in manifest.resources.iter().filter(|r| !r.deleted) {
            for entry in descriptor.file_entries() {
                let rel = sanitize_rel_path(&entry.file)?;
                let path = dir.join(&rel);
                if path.is_file() {
                    let bytes = fs::read(&path).map_err(|e| {
                        SiteError::from(e)
                            .with_op("load_bundle")
                            .with_path(path.display().to_string())
                    })?;
                    files.insert(rel, bytes);
                }
            }
        }
        Ok(Self { manifest, files })
    }
}
