//! Validated, kind-specific resource descriptors

use crate::bundle::manifest::{ApplyMode, FileDescriptor, Manifest, ResourceDescriptor};
use crate::digest::canonical_hash;
use crate::errors::ValidationError;
use crate::model::IconSlot;
use crate::names::{sanitize_rel_path, validate_name};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Website,
    WebsiteIcon,
    Page,
    Component,
    StyleBundle,
    Asset,
    Script,
}

impl ResourceKind {
    /// Case-insensitive parse of a manifest `kind`
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "website" => Some(ResourceKind::Website),
            "websiteicon" => Some(ResourceKind::WebsiteIcon),
            "page" => Some(ResourceKind::Page),
            "component" => Some(ResourceKind::Component),
            "stylebundle" => Some(ResourceKind::StyleBundle),
            "asset" => Some(ResourceKind::Asset),
            "script" => Some(ResourceKind::Script),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Website => "Website",
            ResourceKind::WebsiteIcon => "WebsiteIcon",
            ResourceKind::Page => "Page",
            ResourceKind::Component => "Component",
            ResourceKind::StyleBundle => "StyleBundle",
            ResourceKind::Asset => "Asset",
            ResourceKind::Script => "Script",
        }
    }

    /// Scripts are stored as assets and share their key space
    fn storage_kind(&self) -> ResourceKind {
        match self {
            ResourceKind::Script => ResourceKind::Asset,
            other => *other,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file reference with a sanitized path and canonical `sha256:` hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub path: String,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSpec {
    Website {
        file: FileRef,
    },
    WebsiteIcon {
        slot: IconSlot,
        file: FileRef,
        content_type: Option<String>,
    },
    Page {
        name: String,
        file: FileRef,
    },
    Component {
        name: String,
        file: FileRef,
    },
    StyleBundle {
        name: String,
        /// Sorted by path
        files: Vec<FileRef>,
    },
    Asset {
        filename: String,
        file: FileRef,
        content_type: Option<String>,
        script: bool,
    },
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Website { .. } => ResourceKind::Website,
            ResourceSpec::WebsiteIcon { .. } => ResourceKind::WebsiteIcon,
            ResourceSpec::Page { .. } => ResourceKind::Page,
            ResourceSpec::Component { .. } => ResourceKind::Component,
            ResourceSpec::StyleBundle { .. } => ResourceKind::StyleBundle,
            ResourceSpec::Asset { script: false, .. } => ResourceKind::Asset,
            ResourceSpec::Asset { script: true, .. } => ResourceKind::Script,
        }
    }

    /// Name as reported back to the caller
    pub fn name(&self) -> String {
        match self {
            ResourceSpec::Website { .. } => "website".to_string(),
            ResourceSpec::WebsiteIcon { slot, .. } => slot.resource_name().to_string(),
            ResourceSpec::Page { name, .. }
            | ResourceSpec::Component { name, .. }
            | ResourceSpec::StyleBundle { name, .. } => name.clone(),
            ResourceSpec::Asset { filename, .. } => filename.clone(),
        }
    }

    pub fn files(&self) -> Vec<&FileRef> {
        match self {
            ResourceSpec::StyleBundle { files, .. } => files.iter().collect(),
            ResourceSpec::Website { file }
            | ResourceSpec::WebsiteIcon { file, .. }
            | ResourceSpec::Page { file, .. }
            | ResourceSpec::Component { file, .. }
            | ResourceSpec::Asset { file, .. } => vec![file],
        }
    }
}

/// One resolved manifest entry
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEntry {
    Upsert(ResourceSpec),
    /// Remove the row with this natural key (partial mode only)
    Delete { kind: ResourceKind, key: String },
}

impl ResourceEntry {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceEntry::Upsert(spec) => spec.kind(),
            ResourceEntry::Delete { kind, .. } => *kind,
        }
    }
}

fn invalid(kind: &str, name: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidResource {
        kind: kind.to_string(),
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn resolve_file(entry: &FileDescriptor) -> Result<FileRef, ValidationError> {
    Ok(FileRef {
        path: sanitize_rel_path(&entry.file)?,
        hash: canonical_hash(&entry.hash)?,
    })
}

fn single_file(
    descriptor: &ResourceDescriptor,
    entries: &[FileDescriptor],
) -> Result<FileRef, ValidationError> {
    match entries {
        [only] => resolve_file(only),
        _ => Err(invalid(
            &descriptor.kind,
            &descriptor.name,
            "must reference exactly one file",
        )),
    }
}

fn content_type(descriptor: &ResourceDescriptor) -> Option<String> {
    descriptor
        .content_type
        .as_deref()
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .map(str::to_string)
}

/// Deletion key for a flagged resource
fn resolve_delete(
    kind: ResourceKind,
    descriptor: &ResourceDescriptor,
) -> Result<ResourceEntry, ValidationError> {
    let name = descriptor.name.trim();
    let key = match kind {
        ResourceKind::Website => {
            return Err(invalid(&descriptor.kind, name, "websites cannot be deleted"))
        }
        ResourceKind::WebsiteIcon => IconSlot::from_resource_name(name)
            .ok_or_else(|| invalid(&descriptor.kind, name, "unknown website icon slot"))?
            .as_str()
            .to_string(),
        ResourceKind::Asset | ResourceKind::Script => {
            let key = sanitize_rel_path(name)?;
            let file = descriptor.file.trim();
            if !file.is_empty() && sanitize_rel_path(file)? != key {
                return Err(invalid(&descriptor.kind, name, "name must match file path"));
            }
            key
        }
        ResourceKind::Page | ResourceKind::Component | ResourceKind::StyleBundle => {
            validate_name("resource name", name)?;
            name.to_string()
        }
    };
    Ok(ResourceEntry::Delete { kind, key })
}

fn resolve_upsert(
    kind: ResourceKind,
    descriptor: &ResourceDescriptor,
) -> Result<ResourceSpec, ValidationError> {
    let name = descriptor.name.trim();
    let entries = descriptor.file_entries();
    if entries.is_empty() {
        return Err(invalid(
            &descriptor.kind,
            name,
            "at least one file entry is required",
        ));
    }

    let spec = match kind {
        ResourceKind::Website => ResourceSpec::Website {
            file: single_file(descriptor, &entries)?,
        },
        ResourceKind::WebsiteIcon => {
            let slot = IconSlot::from_resource_name(name).ok_or_else(|| {
                invalid(
                    &descriptor.kind,
                    name,
                    "name must be website-icon-svg, website-icon-ico or website-icon-apple-touch",
                )
            })?;
            ResourceSpec::WebsiteIcon {
                slot,
                file: single_file(descriptor, &entries)?,
                content_type: content_type(descriptor),
            }
        }
        ResourceKind::Page | ResourceKind::Component => {
            validate_name("resource name", name)?;
            let file = single_file(descriptor, &entries)?;
            if kind == ResourceKind::Page {
                ResourceSpec::Page {
                    name: name.to_string(),
                    file,
                }
            } else {
                ResourceSpec::Component {
                    name: name.to_string(),
                    file,
                }
            }
        }
        ResourceKind::StyleBundle => {
            validate_name("resource name", name)?;
            let mut files = entries
                .iter()
                .map(resolve_file)
                .collect::<Result<Vec<_>, _>>()?;
            files.sort_by(|a, b| a.path.cmp(&b.path));
            if files.windows(2).any(|w| w[0].path == w[1].path) {
                return Err(invalid(&descriptor.kind, name, "lists the same file twice"));
            }
            ResourceSpec::StyleBundle {
                name: name.to_string(),
                files,
            }
        }
        ResourceKind::Asset | ResourceKind::Script => {
            let file = single_file(descriptor, &entries)?;
            if sanitize_rel_path(name)? != file.path {
                return Err(invalid(
                    &descriptor.kind,
                    name,
                    format!("name must match file path {:?}", file.path),
                ));
            }
            ResourceSpec::Asset {
                filename: file.path.clone(),
                file,
                content_type: content_type(descriptor),
                script: kind == ResourceKind::Script,
            }
        }
    };
    Ok(spec)
}

impl Manifest {
    /// Validate every descriptor and resolve it into a typed entry.
    ///
    /// Nothing is written before this succeeds, so every input problem
    /// surfaces as a [`ValidationError`].
    pub fn resolve(&self, requested_website: &str) -> Result<Vec<ResourceEntry>, ValidationError> {
        let manifest_website = self.website.trim();
        if manifest_website.is_empty() {
            return Err(ValidationError::EmptyName {
                field: "manifest.website".to_string(),
            });
        }
        if manifest_website != requested_website {
            return Err(ValidationError::WebsiteMismatch {
                manifest: manifest_website.to_string(),
                requested: requested_website.to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.resources.len());
        for descriptor in &self.resources {
            let kind =
                ResourceKind::parse(&descriptor.kind).ok_or_else(|| ValidationError::UnsupportedKind {
                    kind: descriptor.kind.clone(),
                })?;
            if descriptor.name.trim().is_empty() {
                return Err(ValidationError::EmptyName {
                    field: format!("{} name", kind),
                });
            }

            let entry = if descriptor.deleted {
                if self.mode != ApplyMode::Partial {
                    return Err(ValidationError::DeleteInFullMode {
                        kind: kind.to_string(),
                        name: descriptor.name.clone(),
                    });
                }
                resolve_delete(kind, descriptor)?
            } else {
                ResourceEntry::Upsert(resolve_upsert(kind, descriptor)?)
            };

            let key = match &entry {
                ResourceEntry::Upsert(spec) => match spec {
                    ResourceSpec::WebsiteIcon { slot, .. } => slot.as_str().to_string(),
                    other => other.name(),
                },
                ResourceEntry::Delete { key, .. } => key.clone(),
            };
            if !seen.insert((kind.storage_kind(), key)) {
                return Err(ValidationError::DuplicateResource {
                    kind: kind.to_string(),
                    name: descriptor.name.clone(),
                });
            }
            resolved.push(entry);
        }
        Ok(resolved)
    }
}

/// Content type from a file extension, `application/octet-stream` otherwise
pub fn infer_content_type(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "text/xml; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: &str = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn descriptor(kind: &str, name: &str, file: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            kind: kind.to_string(),
            name: name.to_string(),
            file: file.to_string(),
            hash: H.to_string(),
            ..Default::default()
        }
    }

    fn manifest(mode: ApplyMode, resources: Vec<ResourceDescriptor>) -> Manifest {
        Manifest {
            api_version: String::new(),
            mode,
            website: "sample".to_string(),
            resources,
        }
    }

    #[test]
    fn test_resolves_each_kind() {
        let mut style = descriptor("StyleBundle", "default", "");
        style.hash.clear();
        style.files = vec![
            FileDescriptor {
                file: "styles/tokens.css".into(),
                hash: H.into(),
            },
            FileDescriptor {
                file: "styles/default.css".into(),
                hash: H.into(),
            },
        ];
        let m = manifest(
            ApplyMode::Full,
            vec![
                descriptor("website", "website", "website.yaml"),
                descriptor("WebsiteIcon", "website-icon-svg", "branding/icon.svg"),
                descriptor("Page", "home", "pages/home.page.yaml"),
                descriptor("component", "hero", "components/hero.html"),
                style,
                descriptor("Asset", "assets/logo.png", "assets/logo.png"),
                descriptor("Script", "scripts/site.js", "scripts/site.js"),
            ],
        );

        let entries = m.resolve("sample").unwrap();
        let kinds: Vec<_> = entries.iter().map(ResourceEntry::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::Website,
                ResourceKind::WebsiteIcon,
                ResourceKind::Page,
                ResourceKind::Component,
                ResourceKind::StyleBundle,
                ResourceKind::Asset,
                ResourceKind::Script,
            ]
        );
        match &entries[4] {
            ResourceEntry::Upsert(ResourceSpec::StyleBundle { files, .. }) => {
                assert_eq!(files[0].path, "styles/default.css");
                assert_eq!(files[1].path, "styles/tokens.css");
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_rejects_website_mismatch() {
        let m = manifest(ApplyMode::Full, vec![]);
        assert!(matches!(
            m.resolve("other"),
            Err(ValidationError::WebsiteMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_traversal_names_and_paths() {
        let m = manifest(
            ApplyMode::Full,
            vec![descriptor("Page", "../evil", "pages/evil.page.yaml")],
        );
        assert!(m.resolve("sample").is_err());

        let m = manifest(
            ApplyMode::Full,
            vec![descriptor("Asset", "../x.png", "../x.png")],
        );
        assert!(matches!(
            m.resolve("sample"),
            Err(ValidationError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_delete_only_in_partial_mode() {
        let mut d = descriptor("Page", "old", "");
        d.hash.clear();
        d.deleted = true;

        let full = manifest(ApplyMode::Full, vec![d.clone()]);
        assert!(matches!(
            full.resolve("sample"),
            Err(ValidationError::DeleteInFullMode { .. })
        ));

        let partial = manifest(ApplyMode::Partial, vec![d]);
        assert_eq!(
            partial.resolve("sample").unwrap(),
            vec![ResourceEntry::Delete {
                kind: ResourceKind::Page,
                key: "old".to_string()
            }]
        );
    }

    #[test]
    fn test_website_cannot_be_deleted() {
        let mut d = descriptor("Website", "website", "");
        d.deleted = true;
        let m = manifest(ApplyMode::Partial, vec![d]);
        assert!(m.resolve("sample").is_err());
    }

    #[test]
    fn test_asset_and_script_share_key_space() {
        let m = manifest(
            ApplyMode::Full,
            vec![
                descriptor("Asset", "site.js", "site.js"),
                descriptor("Script", "site.js", "site.js"),
            ],
        );
        assert!(matches!(
            m.resolve("sample"),
            Err(ValidationError::DuplicateResource { .. })
        ));
    }

    #[test]
    fn test_unknown_kind_and_bad_hash() {
        let m = manifest(ApplyMode::Full, vec![descriptor("Layout", "x", "x")]);
        assert!(matches!(
            m.resolve("sample"),
            Err(ValidationError::UnsupportedKind { .. })
        ));

        let mut d = descriptor("Page", "home", "pages/home.page.yaml");
        d.hash = "sha256:nothex".to_string();
        let m = manifest(ApplyMode::Full, vec![d]);
        assert!(matches!(
            m.resolve("sample"),
            Err(ValidationError::InvalidHash { .. })
        ));
    }

    #[test]
    fn test_infer_content_type() {
        assert_eq!(infer_content_type("a/b.PNG"), "image/png");
        assert_eq!(infer_content_type("noext"), "application/octet-stream");
    }
}
