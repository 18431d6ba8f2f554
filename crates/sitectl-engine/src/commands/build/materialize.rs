//! Materialize desired state into a source tree the site loader reads.
//!
//! Website and page documents are regenerated from their rows; components,
//! styles, assets and icons come from the blob store.

#![allow(clippy::result_large_err)]

use super::snapshot::DesiredState;
use crate::release::fsutil::write_file;
use serde::de::DeserializeOwned;
use sitectl_core::errors::{Result, SiteError};
use sitectl_core::model::{
    LayoutItem, Metadata, PageDoc, PageHead, PageSpec, WebsiteDoc, WebsiteHead, WebsiteSeo,
    WebsiteSpec,
};
use sitectl_core::names::{sanitize_rel_path, validate_name};
use sitectl_core::site::{
    COMPONENTS_DIR, COMPONENT_SUFFIX, DEFAULT_CSS, PAGES_DIR, PAGE_SUFFIX, TOKENS_CSS,
    WEBSITE_FILE,
};
use sitectl_store::BlobStore;
use std::collections::BTreeMap;
use std::path::Path;

pub const DOCUMENT_API_VERSION: &str = "site/v1";

const TOKENS_BASENAME: &str = "tokens.css";
const DEFAULT_BASENAME: &str = "default.css";

fn build_error(message: impl Into<String>) -> SiteError {
    SiteError::internal(message).with_op("materialize_source")
}

/// Stored JSON fragment; `{}` and blank decode to `None`
fn optional_json<T>(column: &str, raw: &str) -> Result<Option<T>>
where
    T: DeserializeOwned + Default + PartialEq,
{
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let value: T = serde_json::from_str(raw)
        .map_err(|e| build_error(format!("parse stored {}: {}", column, e)))?;
    Ok((value != T::default()).then_some(value))
}

fn read_blob(blobs: &BlobStore, content_hash: &str, what: &str) -> Result<Vec<u8>> {
    blobs
        .read(content_hash)
        .map_err(|e| e.context(format!("load {}", what)))
}

pub fn materialize_source(blobs: &BlobStore, source_dir: &Path, state: &DesiredState) -> Result<()> {
    write_website(source_dir, state)?;

    for row in &state.components {
        validate_name("component name", &row.data.name)?;
        let content = read_blob(blobs, &row.data.content_hash, &format!("component {}", row.data.name))?;
        let rel = format!("{}/{}{}", COMPONENTS_DIR, row.data.name, COMPONENT_SUFFIX);
        write_file(&source_dir.join(rel), &content)?;
    }

    for row in &state.pages {
        validate_name("page name", &row.data.name)?;
        let layout: Vec<LayoutItem> = if row.data.layout_json.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&row.data.layout_json).map_err(|e| {
                build_error(format!("parse layout for page {}: {}", row.data.name, e))
            })?
        };
        let head = PageHead::from_stored_json(&row.data.head_json).map_err(|e| {
            build_error(format!("parse head for page {}: {}", row.data.name, e))
        })?;
        let doc = PageDoc {
            api_version: DOCUMENT_API_VERSION.to_string(),
            kind: "Page".to_string(),
            metadata: Metadata {
                name: row.data.name.clone(),
            },
            spec: PageSpec {
                route: row.data.route.clone(),
                title: row.data.title.clone(),
                description: row.data.description.clone(),
                layout,
                head,
            },
        };
        let yaml = doc
            .to_yaml()
            .map_err(|e| build_error(format!("encode page {}: {}", row.data.name, e)))?;
        let rel = format!("{}/{}{}", PAGES_DIR, row.data.name, PAGE_SUFFIX);
        write_file(&source_dir.join(rel), yaml.as_bytes())?;
    }

    for (rel, hash) in default_style_refs(state)? {
        let content = read_blob(blobs, &hash, &format!("style file {}", rel))?;
        write_file(&source_dir.join(rel), &content)?;
    }

    for row in &state.assets {
        let rel = sanitize_rel_path(&row.data.filename)?;
        let content = read_blob(blobs, &row.data.content_hash, &format!("asset {}", rel))?;
        write_file(&source_dir.join(&rel), &content)?;
    }

    for row in &state.website_icons {
        let rel = sanitize_rel_path(&row.data.source_path)?;
        let content = read_blob(blobs, &row.data.content_hash, &format!("website icon {}", rel))?;
        write_file(&source_dir.join(&rel), &content)?;
    }

    Ok(())
}

fn write_website(source_dir: &Path, state: &DesiredState) -> Result<()> {
    let data = &state.website.data;
    let doc = WebsiteDoc {
        api_version: DOCUMENT_API_VERSION.to_string(),
        kind: "Website".to_string(),
        metadata: Metadata {
            name: state.website.name.clone(),
        },
        spec: WebsiteSpec {
            default_style_bundle: data.default_style_bundle.clone(),
            base_template: data.base_template.clone(),
            head: optional_json::<WebsiteHead>("website head", &data.head_json)?,
            seo: optional_json::<WebsiteSeo>("website seo", &data.seo_json)?,
        },
    };
    let yaml = doc
        .to_yaml()
        .map_err(|e| build_error(format!("encode {}: {}", WEBSITE_FILE, e)))?;
    write_file(&source_dir.join(WEBSITE_FILE), yaml.as_bytes())
}

/// `styles/tokens.css` and `styles/default.css` hashes from the website's
/// default style bundle, matched by file basename
pub fn default_style_refs(state: &DesiredState) -> Result<BTreeMap<&'static str, String>> {
    let wanted = match state.website.data.default_style_bundle.trim() {
        "" => "default",
        name => name,
    };
    let bundle = state
        .style_bundles
        .iter()
        .find(|row| row.data.name == wanted)
        .ok_or_else(|| {
            SiteError::bad_request(format!("default style bundle {:?} not found", wanted))
                .with_op("materialize_source")
        })?;

    let mut refs = BTreeMap::new();
    for file in bundle.data.files()? {
        let base = file.file.rsplit('/').next().unwrap_or(&file.file);
        match base {
            TOKENS_BASENAME => {
                refs.insert(TOKENS_CSS, file.hash);
            }
            DEFAULT_BASENAME => {
                refs.insert(DEFAULT_CSS, file.hash);
            }
            _ => {}
        }
    }
    if !refs.contains_key(TOKENS_CSS) || !refs.contains_key(DEFAULT_CSS) {
        return Err(SiteError::bad_request(format!(
            "style bundle {:?} must include {} and {}",
            wanted, TOKENS_BASENAME, DEFAULT_BASENAME
        ))
        .with_op("materialize_source"));
    }
    Ok(refs)
}
