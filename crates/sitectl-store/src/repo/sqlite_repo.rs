//! SQLite repository implementation
//!
//! Queries over desired-state rows and release history. Every function
//! takes a `&Connection`; a `Transaction` derefs to one, so callers decide
//! the transaction boundary.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use crate::repo::rows::{
    AssetData, AssetRow, AuditEntry, AuditFilter, AuditOperation, AuditPage, ComponentData,
    ComponentRow, EnvironmentRow, NewAuditEntry, PageData, PageRow, ReleaseRow, ReleaseStatus,
    ResourceTable, StyleBundleData, StyleBundleRow, WebsiteData, WebsiteIconData, WebsiteIconRow,
    WebsiteRow,
};
use rusqlite::{Connection, OptionalExtension, Row};
use sitectl_core::errors::{SiteError, SiteErrorKind};

const WEBSITE_COLUMNS: &str = "id, name, default_style_bundle, base_template, head_json, seo_json,
     content_hash, created_at, updated_at";

const ENVIRONMENT_COLUMNS: &str = "id, website_id, name, active_release_id, created_at, updated_at";

const RELEASE_COLUMNS: &str =
    "id, environment_id, manifest_json, output_hashes, build_log, status, created_at";

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn website_from_row(row: &Row<'_>) -> rusqlite::Result<WebsiteRow> {
    Ok(WebsiteRow {
        id: row.get(0)?,
        name: row.get(1)?,
        data: WebsiteData {
            default_style_bundle: row.get(2)?,
            base_template: row.get(3)?,
            head_json: row.get(4)?,
            seo_json: row.get(5)?,
            content_hash: row.get(6)?,
        },
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn environment_from_row(row: &Row<'_>) -> rusqlite::Result<EnvironmentRow> {
    Ok(EnvironmentRow {
        id: row.get(0)?,
        website_id: row.get(1)?,
        name: row.get(2)?,
        active_release_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn release_from_row(row: &Row<'_>) -> rusqlite::Result<ReleaseRow> {
    let status: String = row.get(5)?;
    let status = ReleaseStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown release status {:?}", status).into(),
        )
    })?;
    Ok(ReleaseRow {
        id: row.get(0)?,
        environment_id: row.get(1)?,
        manifest_json: row.get(2)?,
        output_hashes_json: row.get(3)?,
        build_log: row.get(4)?,
        status,
        created_at: row.get(6)?,
    })
}

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let operation: String = row.get(4)?;
    let operation = AuditOperation::parse(&operation).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown audit operation {:?}", operation).into(),
        )
    })?;
    Ok(AuditEntry {
        id: row.get(0)?,
        actor: row.get(1)?,
        timestamp: row.get(2)?,
        environment: row.get(3)?,
        operation,
        resource_summary: row.get(5)?,
        release_id: row.get(6)?,
        metadata: row.get(7)?,
    })
}

// Optional filters bind NULL to disable their clause
const AUDIT_WHERE: &str = "FROM audit_log a
     JOIN environments e ON e.id = a.environment_id
     WHERE e.website_id = ?1
       AND (?2 IS NULL OR a.environment_id = ?2)
       AND (?3 IS NULL OR a.operation = ?3)
       AND (?4 IS NULL OR a.timestamp >= ?4)
       AND (?5 IS NULL OR a.timestamp <= ?5)";

fn collect<T>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql).map_err(from_rusqlite)?;
    let rows = stmt
        .query_map(params, map)
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

/// SQLite repository for websites, environments, resources and releases
pub struct SqliteRepo;

impl SqliteRepo {
    // ----- websites -----

    pub fn get_website_by_name(conn: &Connection, name: &str) -> Result<Option<WebsiteRow>> {
        conn.query_row(
            &format!("SELECT {} FROM websites WHERE name = ?1", WEBSITE_COLUMNS),
            [name],
            website_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// Insert the website if absent and return its row either way
    ///
    /// The no-op `DO UPDATE` makes `RETURNING` yield the existing row on
    /// conflict, so concurrent creators converge without a retry.
    pub fn ensure_website(conn: &Connection, name: &str) -> Result<WebsiteRow> {
        let now = now_millis();
        conn.query_row(
            &format!(
                "INSERT INTO websites (name, created_at, updated_at)
                 VALUES (?1, ?2, ?2)
                 ON CONFLICT(name) DO UPDATE SET name = excluded.name
                 RETURNING {}",
                WEBSITE_COLUMNS
            ),
            rusqlite::params![name, now],
            website_from_row,
        )
        .map_err(from_rusqlite)
    }

    pub fn update_website(conn: &Connection, website_id: i64, data: &WebsiteData) -> Result<()> {
        conn.execute(
            "UPDATE websites SET
                default_style_bundle = ?2,
                base_template = ?3,
                head_json = ?4,
                seo_json = ?5,
                content_hash = ?6,
                updated_at = ?7
             WHERE id = ?1",
            rusqlite::params![
                website_id,
                data.default_style_bundle,
                data.base_template,
                data.head_json,
                data.seo_json,
                data.content_hash,
                now_millis(),
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    // ----- environments -----

    pub fn get_environment(
        conn: &Connection,
        website_id: i64,
        name: &str,
    ) -> Result<Option<EnvironmentRow>> {
        conn.query_row(
            &format!(
                "SELECT {} FROM environments WHERE website_id = ?1 AND name = ?2",
                ENVIRONMENT_COLUMNS
            ),
            rusqlite::params![website_id, name],
            environment_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn ensure_environment(
        conn: &Connection,
        website_id: i64,
        name: &str,
    ) -> Result<EnvironmentRow> {
        let now = now_millis();
        conn.query_row(
            &format!(
                "INSERT INTO environments (website_id, name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(website_id, name) DO UPDATE SET name = excluded.name
                 RETURNING {}",
                ENVIRONMENT_COLUMNS
            ),
            rusqlite::params![website_id, name, now],
            environment_from_row,
        )
        .map_err(from_rusqlite)
    }

    /// Every environment paired with its website name, ordered by both names
    pub fn list_all_environments(conn: &Connection) -> Result<Vec<(String, EnvironmentRow)>> {
        collect(
            conn,
            "SELECT w.name, e.id, e.website_id, e.name, e.active_release_id, e.created_at, e.updated_at
             FROM environments e JOIN websites w ON w.id = e.website_id
             ORDER BY w.name, e.name",
            [],
            |row| {
                Ok((
                    row.get(0)?,
                    EnvironmentRow {
                        id: row.get(1)?,
                        website_id: row.get(2)?,
                        name: row.get(3)?,
                        active_release_id: row.get(4)?,
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                    },
                ))
            },
        )
    }

    pub fn set_active_release(
        conn: &Connection,
        environment_id: i64,
        release_id: Option<&str>,
    ) -> Result<()> {
        let updated = conn
            .execute(
                "UPDATE environments SET active_release_id = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![environment_id, release_id, now_millis()],
            )
            .map_err(from_rusqlite)?;
        if updated == 0 {
            return Err(SiteError::new(SiteErrorKind::NotFound)
                .with_op("set_active_release")
                .with_message(format!("environment id {} not found", environment_id)));
        }
        Ok(())
    }

    // ----- pages -----

    pub fn list_pages(conn: &Connection, website_id: i64) -> Result<Vec<PageRow>> {
        collect(
            conn,
            "SELECT id, website_id, name, route, title, description, layout_json, head_json,
                    content_hash
             FROM pages WHERE website_id = ?1 ORDER BY name",
            [website_id],
            |row| {
                Ok(PageRow {
                    id: row.get(0)?,
                    website_id: row.get(1)?,
                    data: PageData {
                        name: row.get(2)?,
                        route: row.get(3)?,
                        title: row.get(4)?,
                        description: row.get(5)?,
                        layout_json: row.get(6)?,
                        head_json: row.get(7)?,
                        content_hash: row.get(8)?,
                    },
                })
            },
        )
    }

    pub fn upsert_page(conn: &Connection, website_id: i64, page: &PageData) -> Result<()> {
        let now = now_millis();
        conn.execute(
            "INSERT INTO pages (website_id, name, route, title, description, layout_json,
                                head_json, content_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT(website_id, name) DO UPDATE SET
                route = excluded.route,
                title = excluded.title,
                description = excluded.description,
                layout_json = excluded.layout_json,
                head_json = excluded.head_json,
                content_hash = excluded.content_hash,
                updated_at = excluded.updated_at",
            rusqlite::params![
                website_id,
                page.name,
                page.route,
                page.title,
                page.description,
                page.layout_json,
                page.head_json,
                page.content_hash,
                now,
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    // ----- components -----

    pub fn list_components(conn: &Connection, website_id: i64) -> Result<Vec<ComponentRow>> {
        collect(
            conn,
            "SELECT id, website_id, name, scope, content_hash
             FROM components WHERE website_id = ?1 ORDER BY name",
            [website_id],
            |row| {
                Ok(ComponentRow {
                    id: row.get(0)?,
                    website_id: row.get(1)?,
                    data: ComponentData {
                        name: row.get(2)?,
                        scope: row.get(3)?,
                        content_hash: row.get(4)?,
                    },
                })
            },
        )
    }

    pub fn upsert_component(
        conn: &Connection,
        website_id: i64,
        component: &ComponentData,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO components (website_id, name, scope, content_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(website_id, name) DO UPDATE SET
                scope = excluded.scope,
                content_hash = excluded.content_hash,
                updated_at = excluded.updated_at",
            rusqlite::params![
                website_id,
                component.name,
                component.scope,
                component.content_hash,
                now_millis(),
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    // ----- style bundles -----

    pub fn list_style_bundles(conn: &Connection, website_id: i64) -> Result<Vec<StyleBundleRow>> {
        collect(
            conn,
            "SELECT id, website_id, name, files_json
             FROM style_bundles WHERE website_id = ?1 ORDER BY name",
            [website_id],
            |row| {
                Ok(StyleBundleRow {
                    id: row.get(0)?,
                    website_id: row.get(1)?,
                    data: StyleBundleData {
                        name: row.get(2)?,
                        files_json: row.get(3)?,
                    },
                })
            },
        )
    }

    pub fn upsert_style_bundle(
        conn: &Connection,
        website_id: i64,
        bundle: &StyleBundleData,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO style_bundles (website_id, name, files_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(website_id, name) DO UPDATE SET
                files_json = excluded.files_json,
                updated_at = excluded.updated_at",
            rusqlite::params![website_id, bundle.name, bundle.files_json, now_millis()],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    // ----- assets -----

    pub fn list_assets(conn: &Connection, website_id: i64) -> Result<Vec<AssetRow>> {
        collect(
            conn,
            "SELECT id, website_id, filename, content_type, size_bytes, content_hash
             FROM assets WHERE website_id = ?1 ORDER BY filename",
            [website_id],
            |row| {
                Ok(AssetRow {
                    id: row.get(0)?,
                    website_id: row.get(1)?,
                    data: AssetData {
                        filename: row.get(2)?,
                        content_type: row.get(3)?,
                        size_bytes: row.get(4)?,
                        content_hash: row.get(5)?,
                    },
                })
            },
        )
    }

    pub fn upsert_asset(conn: &Connection, website_id: i64, asset: &AssetData) -> Result<()> {
        conn.execute(
            "INSERT INTO assets (website_id, filename, content_type, size_bytes, content_hash,
                                 created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(website_id, filename) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                content_hash = excluded.content_hash",
            rusqlite::params![
                website_id,
                asset.filename,
                asset.content_type,
                asset.size_bytes,
                asset.content_hash,
                now_millis(),
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    // ----- website icons -----

    pub fn list_website_icons(conn: &Connection, website_id: i64) -> Result<Vec<WebsiteIconRow>> {
        collect(
            conn,
            "SELECT id, website_id, slot, source_path, content_type, size_bytes, content_hash
             FROM website_icons WHERE website_id = ?1 ORDER BY slot",
            [website_id],
            |row| {
                Ok(WebsiteIconRow {
                    id: row.get(0)?,
                    website_id: row.get(1)?,
                    data: WebsiteIconData {
                        slot: row.get(2)?,
                        source_path: row.get(3)?,
                        content_type: row.get(4)?,
                        size_bytes: row.get(5)?,
                        content_hash: row.get(6)?,
                    },
                })
            },
        )
    }

    pub fn upsert_website_icon(
        conn: &Connection,
        website_id: i64,
        icon: &WebsiteIconData,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO website_icons (website_id, slot, source_path, content_type, size_bytes,
                                        content_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(website_id, slot) DO UPDATE SET
                source_path = excluded.source_path,
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                content_hash = excluded.content_hash,
                updated_at = excluded.updated_at",
            rusqlite::params![
                website_id,
                icon.slot,
                icon.source_path,
                icon.content_type,
                icon.size_bytes,
                icon.content_hash,
                now_millis(),
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    // ----- shared resource operations -----

    /// Delete one resource row by natural key; returns the number of rows removed
    pub fn delete_resource(
        conn: &Connection,
        table: ResourceTable,
        website_id: i64,
        key: &str,
    ) -> Result<usize> {
        // Table and column names come from a closed enum.
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE website_id = ?1 AND {} = ?2",
                table.table(),
                table.key_column()
            ),
            rusqlite::params![website_id, key],
        )
        .map_err(from_rusqlite)
    }

    pub fn list_resource_keys(
        conn: &Connection,
        table: ResourceTable,
        website_id: i64,
    ) -> Result<Vec<String>> {
        collect(
            conn,
            &format!(
                "SELECT {key} FROM {table} WHERE website_id = ?1 ORDER BY {key}",
                key = table.key_column(),
                table = table.table()
            ),
            [website_id],
            |row| row.get(0),
        )
    }

    // ----- releases -----

    pub fn insert_release(conn: &Connection, release: &ReleaseRow) -> Result<()> {
        conn.execute(
            "INSERT INTO releases (id, environment_id, manifest_json, output_hashes, build_log,
                                   status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                release.id,
                release.environment_id,
                release.manifest_json,
                release.output_hashes_json,
                release.build_log,
                release.status.as_str(),
                release.created_at,
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn get_release(conn: &Connection, release_id: &str) -> Result<Option<ReleaseRow>> {
        conn.query_row(
            &format!("SELECT {} FROM releases WHERE id = ?1", RELEASE_COLUMNS),
            [release_id],
            release_from_row,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// Release history of one environment, newest first
    pub fn list_releases(conn: &Connection, environment_id: i64) -> Result<Vec<ReleaseRow>> {
        collect(
            conn,
            &format!(
                "SELECT {} FROM releases WHERE environment_id = ?1
                 ORDER BY created_at DESC, id DESC",
                RELEASE_COLUMNS
            ),
            [environment_id],
            release_from_row,
        )
    }

    // ----- audit log -----

    /// Append an entry stamped with the current time; returns its id
    pub fn insert_audit(conn: &Connection, entry: &NewAuditEntry) -> Result<i64> {
        conn.execute(
            "INSERT INTO audit_log (actor, timestamp, environment_id, operation,
                                    resource_summary, release_id, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                entry.actor,
                now_millis(),
                entry.environment_id,
                entry.operation.as_str(),
                entry.resource_summary,
                entry.release_id,
                entry.metadata,
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(conn.last_insert_rowid())
    }

    /// Entries matching `filter`, newest first
    pub fn list_audit(conn: &Connection, filter: &AuditFilter) -> Result<AuditPage> {
        let limit = filter.effective_limit();
        let offset = filter.effective_offset();
        let operation = filter.operation.map(|op| op.as_str());
        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) {}", AUDIT_WHERE),
                rusqlite::params![
                    filter.website_id,
                    filter.environment_id,
                    operation,
                    filter.since,
                    filter.until,
                ],
                |row| row.get(0),
            )
            .map_err(from_rusqlite)?;
        let entries = collect(
            conn,
            &format!(
                "SELECT a.id, a.actor, a.timestamp, e.name, a.operation, a.resource_summary,
                        a.release_id, a.metadata_json
                 {}
                 ORDER BY a.timestamp DESC, a.id DESC
                 LIMIT ?6 OFFSET ?7",
                AUDIT_WHERE
            ),
            rusqlite::params![
                filter.website_id,
                filter.environment_id,
                operation,
                filter.since,
                filter.until,
                limit,
                offset,
            ],
            audit_from_row,
        )?;
        Ok(AuditPage {
            entries,
            total,
            limit,
            offset,
        })
    }
}
