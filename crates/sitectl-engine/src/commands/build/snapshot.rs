//! Desired state captured for one release

#![allow(clippy::result_large_err)]

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sitectl_core::errors::{Result, SiteError};
use sitectl_store::repo::{
    AssetRow, ComponentRow, EnvironmentRow, PageRow, SqliteRepo, StyleBundleRow, StyleFile,
    WebsiteIconRow, WebsiteRow,
};

pub const SNAPSHOT_API_VERSION: &str = "sitectl/v1";
pub const SNAPSHOT_KIND: &str = "ReleaseSnapshot";

/// Every row a build reads, loaded inside one read transaction
#[derive(Debug, Clone)]
pub struct DesiredState {
    pub website: WebsiteRow,
    pub environment: EnvironmentRow,
    pub pages: Vec<PageRow>,
    pub components: Vec<ComponentRow>,
    pub style_bundles: Vec<StyleBundleRow>,
    pub assets: Vec<AssetRow>,
    pub website_icons: Vec<WebsiteIconRow>,
}

impl DesiredState {
    /// # Errors
    ///
    /// `InvalidInput` when the website has no pages.
    pub fn load(conn: &Connection, website: WebsiteRow, environment: EnvironmentRow) -> Result<Self> {
        let id = website.id;
        let pages = SqliteRepo::list_pages(conn, id)?;
        if pages.is_empty() {
            return Err(SiteError::bad_request(format!(
                "website {:?} has no pages to build",
                website.name
            ))
            .with_website(website.name.clone()));
        }
        Ok(Self {
            pages,
            components: SqliteRepo::list_components(conn, id)?,
            style_bundles: SqliteRepo::list_style_bundles(conn, id)?,
            assets: SqliteRepo::list_assets(conn, id)?,
            website_icons: SqliteRepo::list_website_icons(conn, id)?,
            website,
            environment,
        })
    }

    pub fn snapshot(&self, release_id: &str) -> Result<ReleaseSnapshot> {
        let website = &self.website.data;
        let mut style_bundles = Vec::with_capacity(self.style_bundles.len());
        for row in &self.style_bundles {
            style_bundles.push(StyleBundleEntry {
                name: row.data.name.clone(),
                files: row.data.files()?,
            });
        }
        let mut pages = Vec::with_capacity(self.pages.len());
        for row in &self.pages {
            pages.push(PageEntry {
                name: row.data.name.clone(),
                route: row.data.route.clone(),
                title: row.data.title.clone(),
                description: row.data.description.clone(),
                layout: stored_json(&row.data.layout_json, Value::Array(Vec::new()))?,
                head: stored_json(&row.data.head_json, empty_object())?,
                content_hash: row.data.content_hash.clone(),
            });
        }

        Ok(ReleaseSnapshot {
            api_version: SNAPSHOT_API_VERSION.to_string(),
            kind: SNAPSHOT_KIND.to_string(),
            release_id: release_id.to_string(),
            website: self.website.name.clone(),
            environment: self.environment.name.clone(),
            generated_at: now_rfc3339(),
            default_style_bundle: website.default_style_bundle.clone(),
            base_template: website.base_template.clone(),
            website_head: stored_json(&website.head_json, empty_object())?,
            website_seo: stored_json(&website.seo_json, empty_object())?,
            website_content_hash: website.content_hash.clone(),
            pages,
            components: self
                .components
                .iter()
                .map(|row| ComponentEntry {
                    name: row.data.name.clone(),
                    scope: row.data.scope.clone(),
                    content_hash: row.data.content_hash.clone(),
                })
                .collect(),
            style_bundles,
            assets: self
                .assets
                .iter()
                .map(|row| AssetEntry {
                    filename: row.data.filename.clone(),
                    content_type: row.data.content_type.clone(),
                    size_bytes: row.data.size_bytes,
                    content_hash: row.data.content_hash.clone(),
                })
                .collect(),
            website_icons: self
                .website_icons
                .iter()
                .map(|row| IconEntry {
                    slot: row.data.slot.clone(),
                    source_path: row.data.source_path.clone(),
                    content_type: row.data.content_type.clone(),
                    size_bytes: row.data.size_bytes,
                    content_hash: row.data.content_hash.clone(),
                })
                .collect(),
            source_release_id: None,
            source_env: None,
        })
    }
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn stored_json(raw: &str, fallback: Value) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(fallback);
    }
    Ok(serde_json::from_str(raw)?)
}

/// Manifest snapshot written to `.manifest.json` and the release row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSnapshot {
    pub api_version: String,
    pub kind: String,
    pub release_id: String,
    pub website: String,
    pub environment: String,
    pub generated_at: String,
    pub default_style_bundle: String,
    pub base_template: String,
    pub website_head: Value,
    pub website_seo: Value,
    pub website_content_hash: String,
    pub pages: Vec<PageEntry>,
    pub components: Vec<ComponentEntry>,
    pub style_bundles: Vec<StyleBundleEntry>,
    pub assets: Vec<AssetEntry>,
    pub website_icons: Vec<IconEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_release_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_env: Option<String>,
}

impl ReleaseSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEntry {
    pub name: String,
    pub route: String,
    pub title: String,
    pub description: String,
    pub layout: Value,
    pub head: Value,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentEntry {
    pub name: String,
    pub scope: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleBundleEntry {
    pub name: String,
    pub files: Vec<StyleFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconEntry {
    pub slot: String,
    pub source_path: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub content_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitectl_store::db::open_in_memory_migrated;
    use sitectl_store::repo::PageData;

    #[test]
    fn test_snapshot_uses_flat_camel_case_keys() {
        let conn = open_in_memory_migrated().unwrap();
        let website = SqliteRepo::ensure_website(&conn, "sample").unwrap();
        let env = SqliteRepo::ensure_environment(&conn, website.id, "staging").unwrap();
        SqliteRepo::upsert_page(
            &conn,
            website.id,
            &PageData {
                name: "home".into(),
                route: "/".into(),
                title: "Home".into(),
                description: String::new(),
                layout_json: r#"[{"include":"hero"}]"#.into(),
                head_json: "{}".into(),
                content_hash: format!("sha256:{}", "a".repeat(64)),
            },
        )
        .unwrap();

        let state = DesiredState::load(&conn, website, env).unwrap();
        let json = state.snapshot("r1").unwrap().to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["kind"], "ReleaseSnapshot");
        assert_eq!(value["releaseId"], "r1");
        assert_eq!(value["environment"], "staging");
        assert_eq!(value["pages"][0]["layout"][0]["include"], "hero");
        assert!(value.get("sourceReleaseId").is_none());
    }

    #[test]
    fn test_no_pages_is_bad_request() {
        let conn = open_in_memory_migrated().unwrap();
        let website = SqliteRepo::ensure_website(&conn, "empty").unwrap();
        let env = SqliteRepo::ensure_environment(&conn, website.id, "staging").unwrap();

        let err = DesiredState::load(&conn, website, env).unwrap_err();

        assert!(err.is_bad_request());
    }
}
