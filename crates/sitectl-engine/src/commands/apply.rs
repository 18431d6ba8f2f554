//! Desired-state reconciliation.
//!
//! ## Pipeline (in order):
//! 1. Resolve the manifest into typed entries (names, paths, hashes, duplicates)
//! 2. Prepare every upsert from bundle bytes: presence, digest check, document parsing
//! 3. Open one immediate transaction; upsert the website and environment rows
//! 4. Check website head icon references against this apply and stored icons
//! 5. Classify and write each resource (blobs and rows skipped in dry-run)
//! 6. Apply explicit deletions (partial) or prune unkept rows (full)
//! 7. Commit, or roll back for dry-run

#![allow(clippy::result_large_err)]

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use sitectl_core::bundle::{
    infer_content_type, ApplyMode, Bundle, FileRef, ResourceEntry, ResourceKind, ResourceSpec,
};
use sitectl_core::digest::{content_hash, hash_hex};
use sitectl_core::errors::{Result, SiteError, ValidationError};
use sitectl_core::model::website::DEFAULT_BASE_TEMPLATE;
use sitectl_core::model::{PageDoc, PageHead, WebsiteDoc};
use sitectl_core::names::{normalize_route, validate_name};
use sitectl_core::site::COMPONENT_SCOPE_GLOBAL;
use sitectl_store::errors::from_rusqlite;
use sitectl_store::repo::{
    AssetData, ComponentData, PageData, ResourceTable, SqliteRepo, StyleBundleData, StyleFile,
    WebsiteData, WebsiteIconData, WebsiteRow,
};
use sitectl_store::BlobStore;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One resource the apply accepted, with the hash it was accepted under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedResource {
    pub kind: String,
    pub name: String,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub website: String,
    pub environment: String,
    pub mode: ApplyMode,
    pub dry_run: bool,
    pub accepted: Vec<AcceptedResource>,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// A validated upsert, ready to classify and write
enum Prepared {
    Website {
        data: WebsiteData,
        doc: WebsiteDoc,
    },
    Icon {
        resource_name: String,
        data: WebsiteIconData,
    },
    Page {
        data: PageData,
        includes: Vec<String>,
    },
    Component {
        data: ComponentData,
    },
    StyleBundle {
        data: StyleBundleData,
        accepted_hash: String,
    },
    Asset {
        data: AssetData,
        script: bool,
    },
}

struct PreparedResource<'b> {
    prepared: Prepared,
    blobs: Vec<(String, &'b [u8])>,
}

/// Reconciles stored desired state against a bundle
#[derive(Debug, Clone)]
pub struct Applier {
    blobs: BlobStore,
}

impl Applier {
    pub fn new(blobs: BlobStore) -> Self {
        Self { blobs }
    }

    /// Apply `bundle` to `website`/`environment`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for anything wrong with the request or bundle; nothing
    /// is written in that case. Storage failures roll the transaction back.
    pub fn apply(
        &self,
        conn: &mut Connection,
        website: &str,
        environment: &str,
        bundle: &Bundle,
        dry_run: bool,
    ) -> Result<ApplyResult> {
        let website = website.trim();
        let environment = environment.trim();
        validate_name("website", website)?;
        validate_name("environment", environment)?;

        let entries = bundle.manifest.resolve(website)?;
        let mode = bundle.manifest.mode;

        let mut prepared = Vec::new();
        let mut deletions = Vec::new();
        for entry in &entries {
            match entry {
                ResourceEntry::Upsert(spec) => prepared.push(prepare(website, spec, bundle)?),
                ResourceEntry::Delete { kind, key } => deletions.push((*kind, key.clone())),
            }
        }
        check_unique_routes(&prepared)?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(from_rusqlite)?;

        let website_row = SqliteRepo::ensure_website(&tx, website)?;
        SqliteRepo::ensure_environment(&tx, website_row.id, environment)?;

        let current = CurrentState::load(&tx, &website_row)?;
        check_icon_references(&prepared, &current)?;

        let mut result = ApplyResult {
            website: website.to_string(),
            environment: environment.to_string(),
            mode,
            dry_run,
            accepted: Vec::new(),
            created: 0,
            updated: 0,
            deleted: 0,
            warnings: Vec::new(),
        };
        let mut kept: HashMap<ResourceTable, BTreeSet<String>> = HashMap::new();
        let mut page_includes = BTreeMap::new();

        for resource in &prepared {
            if !dry_run {
                for (hex, bytes) in &resource.blobs {
                    self.blobs.put(hex, bytes)?;
                }
            }
            let change = write_resource(&tx, &website_row, &current, &resource.prepared, dry_run)?;
            match change {
                Change::Created => result.created += 1,
                Change::Updated => result.updated += 1,
                Change::Unchanged => {}
            }
            let (table, key, accepted) = describe(website, &resource.prepared);
            if let Some(table) = table {
                kept.entry(table).or_default().insert(key);
            }
            if let Prepared::Page { data, includes } = &resource.prepared {
                page_includes.insert(data.name.clone(), includes.clone());
            }
            result.accepted.push(accepted);
        }

        for (kind, key) in &deletions {
            let table = table_for(*kind)
                .ok_or_else(|| SiteError::bad_request(format!("{} resources cannot be deleted", kind)))?;
            let removed = if dry_run {
                usize::from(current.keys(table).contains(key))
            } else {
                SqliteRepo::delete_resource(&tx, table, website_row.id, key)?
            };
            result.deleted += removed;
            result.accepted.push(AcceptedResource {
                kind: kind.to_string(),
                name: key.clone(),
                hash: String::new(),
            });
        }

        if mode == ApplyMode::Full {
            let prune_icons = kept.contains_key(&ResourceTable::WebsiteIcons);
            for table in ResourceTable::ALL {
                if table == ResourceTable::WebsiteIcons && !prune_icons {
                    continue;
                }
                let keep = kept.get(&table);
                for key in current.keys(table) {
                    if keep.is_some_and(|k| k.contains(key)) {
                        continue;
                    }
                    if !dry_run {
                        SqliteRepo::delete_resource(&tx, table, website_row.id, key)?;
                    }
                    result.deleted += 1;
                }
            }
        }

        result.warnings = dangling_include_warnings(
            mode,
            &current,
            kept.get(&ResourceTable::Components),
            &deletions,
            &page_includes,
        );

        if dry_run {
            tx.rollback().map_err(from_rusqlite)?;
        } else {
            tx.commit().map_err(from_rusqlite)?;
        }
        Ok(result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Created,
    Updated,
    Unchanged,
}

fn classify<T: PartialEq>(existing: Option<&T>, incoming: &T) -> Change {
    match existing {
        None => Change::Created,
        Some(current) if current != incoming => Change::Updated,
        Some(_) => Change::Unchanged,
    }
}

/// Stored rows for one website, keyed by natural key
struct CurrentState {
    website: WebsiteData,
    pages: BTreeMap<String, PageData>,
    components: BTreeMap<String, ComponentData>,
    style_bundles: BTreeMap<String, StyleBundleData>,
    assets: BTreeMap<String, AssetData>,
    icons: BTreeMap<String, WebsiteIconData>,
}

impl CurrentState {
    fn load(conn: &Connection, website: &WebsiteRow) -> Result<Self> {
        let id = website.id;
        Ok(Self {
            website: website.data.clone(),
            pages: SqliteRepo::list_pages(conn, id)?
                .into_iter()
                .map(|r| (r.data.name.clone(), r.data))
                .collect(),
            components: SqliteRepo::list_components(conn, id)?
                .into_iter()
                .map(|r| (r.data.name.clone(), r.data))
                .collect(),
            style_bundles: SqliteRepo::list_style_bundles(conn, id)?
                .into_iter()
                .map(|r| (r.data.name.clone(), r.data))
                .collect(),
            assets: SqliteRepo::list_assets(conn, id)?
                .into_iter()
                .map(|r| (r.data.filename.clone(), r.data))
                .collect(),
            icons: SqliteRepo::list_website_icons(conn, id)?
                .into_iter()
                .map(|r| (r.data.slot.clone(), r.data))
                .collect(),
        })
    }

    fn keys(&self, table: ResourceTable) -> BTreeSet<&String> {
        match table {
            ResourceTable::Pages => self.pages.keys().collect(),
            ResourceTable::Components => self.components.keys().collect(),
            ResourceTable::StyleBundles => self.style_bundles.keys().collect(),
            ResourceTable::Assets => self.assets.keys().collect(),
            ResourceTable::WebsiteIcons => self.icons.keys().collect(),
        }
    }
}

fn table_for(kind: ResourceKind) -> Option<ResourceTable> {
    match kind {
        ResourceKind::Website => None,
        ResourceKind::WebsiteIcon => Some(ResourceTable::WebsiteIcons),
        ResourceKind::Page => Some(ResourceTable::Pages),
        ResourceKind::Component => Some(ResourceTable::Components),
        ResourceKind::StyleBundle => Some(ResourceTable::StyleBundles),
        ResourceKind::Asset | ResourceKind::Script => Some(ResourceTable::Assets),
    }
}

/// Bytes for `file`, checked against its declared digest
fn verified_bytes<'b>(spec: &ResourceSpec, file: &FileRef, bundle: &'b Bundle) -> Result<&'b [u8]> {
    let bytes = bundle.file(&file.path).ok_or_else(|| ValidationError::MissingFile {
        kind: spec.kind().to_string(),
        name: spec.name(),
        file: file.path.clone(),
    })?;
    let actual = content_hash(bytes);
    if actual != file.hash {
        return Err(ValidationError::ContentHashMismatch {
            file: file.path.clone(),
            declared: file.hash.clone(),
            actual,
        }
        .into());
    }
    Ok(bytes)
}

fn blob_entry<'b>(file: &FileRef, bytes: &'b [u8]) -> Result<(String, &'b [u8])> {
    Ok((hash_hex(&file.hash)?, bytes))
}

fn invalid_document(document: &str, reason: impl Into<String>) -> SiteError {
    ValidationError::InvalidDocument {
        document: document.to_string(),
        reason: reason.into(),
    }
    .into()
}

fn prepare<'b>(website: &str, spec: &ResourceSpec, bundle: &'b Bundle) -> Result<PreparedResource<'b>> {
    let mut blobs = Vec::new();
    let prepared = match spec {
        ResourceSpec::Website { file } => {
            let bytes = verified_bytes(spec, file, bundle)?;
            blobs.push(blob_entry(file, bytes)?);
            let mut doc = WebsiteDoc::from_yaml(bytes)?;
            let declared = doc.metadata.name.trim();
            if !declared.is_empty() && declared != website {
                return Err(invalid_document(
                    &file.path,
                    format!("metadata.name {:?} does not match website {:?}", declared, website),
                ));
            }
            if let Some(seo) = doc.spec.seo.as_mut() {
                seo.normalize()?;
            }
            let head_json = match &doc.spec.head {
                Some(head) => serde_json::to_string(head)?,
                None => "{}".to_string(),
            };
            let seo_json = match &doc.spec.seo {
                Some(seo) => serde_json::to_string(seo)?,
                None => "{}".to_string(),
            };
            let base_template = match doc.spec.base_template.trim() {
                "" => DEFAULT_BASE_TEMPLATE.to_string(),
                name => name.to_string(),
            };
            Prepared::Website {
                data: WebsiteData {
                    default_style_bundle: doc.style_bundle().to_string(),
                    base_template,
                    head_json,
                    seo_json,
                    content_hash: file.hash.clone(),
                },
                doc,
            }
        }
        ResourceSpec::WebsiteIcon {
            slot,
            file,
            content_type,
        } => {
            let bytes = verified_bytes(spec, file, bundle)?;
            blobs.push(blob_entry(file, bytes)?);
            Prepared::Icon {
                resource_name: slot.resource_name().to_string(),
                data: WebsiteIconData {
                    slot: slot.as_str().to_string(),
                    source_path: file.path.clone(),
                    content_type: content_type
                        .clone()
                        .unwrap_or_else(|| infer_content_type(&file.path).to_string()),
                    size_bytes: bytes.len() as i64,
                    content_hash: file.hash.clone(),
                },
            }
        }
        ResourceSpec::Page { name, file } => {
            let bytes = verified_bytes(spec, file, bundle)?;
            blobs.push(blob_entry(file, bytes)?);
            let doc = PageDoc::from_yaml(&file.path, bytes)?;
            let declared = doc.metadata.name.trim();
            if !declared.is_empty() && declared != name {
                return Err(invalid_document(
                    &file.path,
                    format!("metadata.name {:?} does not match page {:?}", declared, name),
                ));
            }
            Prepared::Page {
                includes: doc.includes(),
                data: PageData {
                    name: name.clone(),
                    route: normalize_route(&doc.spec.route),
                    title: doc.spec.title.clone(),
                    description: doc.spec.description.clone(),
                    layout_json: serde_json::to_string(&doc.spec.layout)?,
                    head_json: PageHead::canonical_json(doc.spec.head.as_ref())?,
                    content_hash: file.hash.clone(),
                },
            }
        }
        ResourceSpec::Component { name, file } => {
            let bytes = verified_bytes(spec, file, bundle)?;
            blobs.push(blob_entry(file, bytes)?);
            Prepared::Component {
                data: ComponentData {
                    name: name.clone(),
                    scope: COMPONENT_SCOPE_GLOBAL.to_string(),
                    content_hash: file.hash.clone(),
                },
            }
        }
        ResourceSpec::StyleBundle { name, files } => {
            let mut style_files = Vec::with_capacity(files.len());
            for file in files {
                let bytes = verified_bytes(spec, file, bundle)?;
                blobs.push(blob_entry(file, bytes)?);
                style_files.push(StyleFile {
                    file: file.path.clone(),
                    hash: file.hash.clone(),
                });
            }
            let files_json = serde_json::to_string(&style_files)?;
            let accepted_hash = match style_files.as_slice() {
                [only] => only.hash.clone(),
                _ => content_hash(files_json.as_bytes()),
            };
            Prepared::StyleBundle {
                data: StyleBundleData {
                    name: name.clone(),
                    files_json,
                },
                accepted_hash,
            }
        }
        ResourceSpec::Asset {
            filename,
            file,
            content_type,
            script,
        } => {
            let bytes = verified_bytes(spec, file, bundle)?;
            blobs.push(blob_entry(file, bytes)?);
            Prepared::Asset {
                data: AssetData {
                    filename: filename.clone(),
                    content_type: content_type
                        .clone()
                        .unwrap_or_else(|| infer_content_type(filename).to_string()),
                    size_bytes: bytes.len() as i64,
                    content_hash: file.hash.clone(),
                },
                script: *script,
            }
        }
    };
    Ok(PreparedResource { prepared, blobs })
}

fn check_unique_routes(prepared: &[PreparedResource<'_>]) -> Result<()> {
    let mut routes: HashMap<&str, &str> = HashMap::new();
    for resource in prepared {
        if let Prepared::Page { data, .. } = &resource.prepared {
            if let Some(other) = routes.insert(data.route.as_str(), data.name.as_str()) {
                return Err(ValidationError::InvalidResource {
                    kind: ResourceKind::Page.to_string(),
                    name: data.name.clone(),
                    reason: format!("route {} is already used by page {}", data.route, other),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Every icon declared in the website head must come from this apply with
/// the same path, or already be stored with that source path.
fn check_icon_references(prepared: &[PreparedResource<'_>], current: &CurrentState) -> Result<()> {
    let Some(doc) = prepared.iter().find_map(|r| match &r.prepared {
        Prepared::Website { doc, .. } => Some(doc),
        _ => None,
    }) else {
        return Ok(());
    };
    let Some(icons) = doc.icons() else {
        return Ok(());
    };

    let incoming: HashMap<&str, &str> = prepared
        .iter()
        .filter_map(|r| match &r.prepared {
            Prepared::Icon { data, .. } => Some((data.slot.as_str(), data.source_path.as_str())),
            _ => None,
        })
        .collect();

    for (slot, declared) in icons.declared() {
        let bad = |reason: String| -> SiteError {
            ValidationError::InvalidResource {
                kind: ResourceKind::Website.to_string(),
                name: doc.metadata.name.clone(),
                reason,
            }
            .into()
        };
        match incoming.get(slot.as_str()) {
            Some(path) if *path == declared => continue,
            Some(path) => {
                return Err(bad(format!(
                    "head.icons.{} expects file {:?} but the bundle provides {:?}",
                    slot.head_field(),
                    declared,
                    path
                )))
            }
            None => {}
        }
        let stored = current
            .icons
            .get(slot.as_str())
            .is_some_and(|icon| icon.source_path == declared);
        if !stored {
            return Err(bad(format!(
                "head.icons.{} references missing icon file {:?}",
                slot.head_field(),
                declared
            )));
        }
    }
    Ok(())
}

fn write_resource(
    conn: &Connection,
    website: &WebsiteRow,
    current: &CurrentState,
    prepared: &Prepared,
    dry_run: bool,
) -> Result<Change> {
    let id = website.id;
    let change = match prepared {
        Prepared::Website { data, .. } => {
            let change = if current.website.content_hash.is_empty() {
                Change::Created
            } else {
                classify(Some(&current.website), data)
            };
            if !dry_run && change != Change::Unchanged {
                SqliteRepo::update_website(conn, id, data)?;
            }
            change
        }
        Prepared::Icon { data, .. } => {
            let change = classify(current.icons.get(&data.slot), data);
            if !dry_run && change != Change::Unchanged {
                SqliteRepo::upsert_website_icon(conn, id, data)?;
            }
            change
        }
        Prepared::Page { data, .. } => {
            let change = classify(current.pages.get(&data.name), data);
            if !dry_run && change != Change::Unchanged {
                SqliteRepo::upsert_page(conn, id, data)?;
            }
            change
        }
        Prepared::Component { data } => {
            let change = classify(current.components.get(&data.name), data);
            if !dry_run && change != Change::Unchanged {
                SqliteRepo::upsert_component(conn, id, data)?;
            }
            change
        }
        Prepared::StyleBundle { data, .. } => {
            let change = classify(current.style_bundles.get(&data.name), data);
            if !dry_run && change != Change::Unchanged {
                SqliteRepo::upsert_style_bundle(conn, id, data)?;
            }
            change
        }
        Prepared::Asset { data, .. } => {
            let change = classify(current.assets.get(&data.filename), data);
            if !dry_run && change != Change::Unchanged {
                SqliteRepo::upsert_asset(conn, id, data)?;
            }
            change
        }
    };
    Ok(change)
}

/// Table and key the resource keeps alive, plus its accepted entry
fn describe(website: &str, prepared: &Prepared) -> (Option<ResourceTable>, String, AcceptedResource) {
    let accepted = |kind: ResourceKind, name: &str, hash: &str| AcceptedResource {
        kind: kind.to_string(),
        name: name.to_string(),
        hash: hash.to_string(),
    };
    match prepared {
        Prepared::Website { data, .. } => (
            None,
            website.to_string(),
            accepted(ResourceKind::Website, website, &data.content_hash),
        ),
        Prepared::Icon { resource_name, data } => (
            Some(ResourceTable::WebsiteIcons),
            data.slot.clone(),
            accepted(ResourceKind::WebsiteIcon, resource_name, &data.content_hash),
        ),
        Prepared::Page { data, .. } => (
            Some(ResourceTable::Pages),
            data.name.clone(),
            accepted(ResourceKind::Page, &data.name, &data.content_hash),
        ),
        Prepared::Component { data } => (
            Some(ResourceTable::Components),
            data.name.clone(),
            accepted(ResourceKind::Component, &data.name, &data.content_hash),
        ),
        Prepared::StyleBundle {
            data,
            accepted_hash,
        } => (
            Some(ResourceTable::StyleBundles),
            data.name.clone(),
            accepted(ResourceKind::StyleBundle, &data.name, accepted_hash),
        ),
        Prepared::Asset { data, script } => {
            let kind = if *script {
                ResourceKind::Script
            } else {
                ResourceKind::Asset
            };
            (
                Some(ResourceTable::Assets),
                data.filename.clone(),
                accepted(kind, &data.filename, &data.content_hash),
            )
        }
    }
}

/// Pages in this apply whose layout names a component that will not exist
/// once the apply lands. The build would reject them, so say so now.
fn dangling_include_warnings(
    mode: ApplyMode,
    current: &CurrentState,
    kept_components: Option<&BTreeSet<String>>,
    deletions: &[(ResourceKind, String)],
    page_includes: &BTreeMap<String, Vec<String>>,
) -> Vec<String> {
    let mut components: BTreeSet<String> = match mode {
        ApplyMode::Full => BTreeSet::new(),
        ApplyMode::Partial => current.components.keys().cloned().collect(),
    };
    if let Some(kept) = kept_components {
        components.extend(kept.iter().cloned());
    }
    for (kind, key) in deletions {
        if *kind == ResourceKind::Component {
            components.remove(key);
        }
    }

    let mut warnings = Vec::new();
    for (page, includes) in page_includes {
        for include in includes {
            if !components.contains(include) {
                warnings.push(format!(
                    "page {} includes component {:?} which is not defined",
                    page, include
                ));
            }
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitectl_core::model::IconSlot;

    #[test]
    fn test_classify() {
        assert_eq!(classify(None, &1), Change::Created);
        assert_eq!(classify(Some(&1), &2), Change::Updated);
        assert_eq!(classify(Some(&1), &1), Change::Unchanged);
    }

    #[test]
    fn test_website_cannot_be_deleted() {
        assert_eq!(table_for(ResourceKind::Website), None);
        assert_eq!(table_for(ResourceKind::Script), Some(ResourceTable::Assets));
    }

    #[test]
    fn test_icon_slot_key_matches_store() {
        for slot in IconSlot::ALL {
            assert_eq!(IconSlot::parse(slot.as_str()), Some(slot));
        }
    }
}
