//! Row types for the sitectl schema
//!
//! Each resource row splits into bookkeeping (`id`, `website_id`,
//! timestamps) and a `*Data` struct holding every field that carries
//! meaning. Reconciliation compares `*Data` values to classify changes.

#![allow(clippy::result_large_err)]

use crate::errors::{corrupt_json, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteData {
    pub default_style_bundle: String,
    pub base_template: String,
    /// Canonical JSON, `{}` when absent
    pub head_json: String,
    /// Canonical JSON, `{}` when absent
    pub seo_json: String,
    /// Hash of the applied `website.yaml`; empty until one is applied
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteRow {
    pub id: i64,
    pub name: String,
    pub data: WebsiteData,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentRow {
    pub id: i64,
    pub website_id: i64,
    pub name: String,
    pub active_release_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageData {
    pub name: String,
    pub route: String,
    pub title: String,
    pub description: String,
    pub layout_json: String,
    pub head_json: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRow {
    pub id: i64,
    pub website_id: i64,
    pub data: PageData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentData {
    pub name: String,
    pub scope: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRow {
    pub id: i64,
    pub website_id: i64,
    pub data: ComponentData,
}

/// One file of a style bundle, as stored in `files_json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleFile {
    pub file: String,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleBundleData {
    pub name: String,
    pub files_json: String,
}

impl StyleBundleData {
    pub fn files(&self) -> Result<Vec<StyleFile>> {
        serde_json::from_str(&self.files_json).map_err(|e| corrupt_json("files_json", e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleBundleRow {
    pub id: i64,
    pub website_id: i64,
    pub data: StyleBundleData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetData {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRow {
    pub id: i64,
    pub website_id: i64,
    pub data: AssetData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteIconData {
    pub slot: String,
    pub source_path: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteIconRow {
    pub id: i64,
    pub website_id: i64,
    pub data: WebsiteIconData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStatus {
    Active,
    Failed,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Active => "active",
            ReleaseStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(ReleaseStatus::Active),
            "failed" => Some(ReleaseStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseRow {
    pub id: String,
    pub environment_id: i64,
    pub manifest_json: String,
    /// JSON object mapping output path to `sha256:<hex>`
    pub output_hashes_json: String,
    pub build_log: String,
    pub status: ReleaseStatus,
    pub created_at: i64,
}

impl ReleaseRow {
    pub fn output_hashes(&self) -> Result<BTreeMap<String, String>> {
        if self.output_hashes_json.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&self.output_hashes_json).map_err(|e| corrupt_json("output_hashes", e))
    }

    pub fn is_failed(&self) -> bool {
        self.status == ReleaseStatus::Failed
    }
}

pub const DEFAULT_AUDIT_LIMIT: i64 = 50;
pub const MAX_AUDIT_LIMIT: i64 = 1000;

/// Mutating operations recorded in `audit_log`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOperation {
    #[serde(rename = "apply")]
    Apply,
    #[serde(rename = "release.build")]
    ReleaseBuild,
    #[serde(rename = "release.activate")]
    ReleaseActivate,
    #[serde(rename = "rollback")]
    Rollback,
    #[serde(rename = "promote")]
    Promote,
}

impl AuditOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOperation::Apply => "apply",
            AuditOperation::ReleaseBuild => "release.build",
            AuditOperation::ReleaseActivate => "release.activate",
            AuditOperation::Rollback => "rollback",
            AuditOperation::Promote => "promote",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "apply" => Some(AuditOperation::Apply),
            "release.build" => Some(AuditOperation::ReleaseBuild),
            "release.activate" => Some(AuditOperation::ReleaseActivate),
            "rollback" => Some(AuditOperation::Rollback),
            "promote" => Some(AuditOperation::Promote),
            _ => None,
        }
    }
}

/// An audit record before insertion; the repository stamps id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub actor: String,
    pub environment_id: i64,
    pub operation: AuditOperation,
    pub resource_summary: String,
    pub release_id: Option<String>,
    /// JSON object
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: i64,
    pub actor: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub environment: String,
    pub operation: AuditOperation,
    pub resource_summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_id: Option<String>,
    pub metadata: serde_json::Value,
}

/// Query over one website's audit log. Bounds on `timestamp` are inclusive.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub website_id: i64,
    pub environment_id: Option<i64>,
    pub operation: Option<AuditOperation>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    /// Non-positive means [`DEFAULT_AUDIT_LIMIT`]; capped at [`MAX_AUDIT_LIMIT`]
    pub limit: i64,
    pub offset: i64,
}

impl AuditFilter {
    pub fn effective_limit(&self) -> i64 {
        if self.limit <= 0 {
            DEFAULT_AUDIT_LIMIT
        } else {
            self.limit.min(MAX_AUDIT_LIMIT)
        }
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.max(0)
    }
}

/// One page of audit entries, newest first, with the unpaged total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Resource tables that share the `(website_id, key)` shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceTable {
    Pages,
    Components,
    StyleBundles,
    Assets,
    WebsiteIcons,
}

impl ResourceTable {
    pub const ALL: [ResourceTable; 5] = [
        ResourceTable::Pages,
        ResourceTable::Components,
        ResourceTable::StyleBundles,
        ResourceTable::Assets,
        ResourceTable::WebsiteIcons,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            ResourceTable::Pages => "pages",
            ResourceTable::Components => "components",
            ResourceTable::StyleBundles => "style_bundles",
            ResourceTable::Assets => "assets",
            ResourceTable::WebsiteIcons => "website_icons",
        }
    }

    /// Natural key column
    pub fn key_column(&self) -> &'static str {
        match self {
            ResourceTable::Pages | ResourceTable::Components | ResourceTable::StyleBundles => {
                "name"
            }
            ResourceTable::Assets => "filename",
            ResourceTable::WebsiteIcons => "slot",
        }
    }
}
