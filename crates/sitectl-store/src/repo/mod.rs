//! Repository layer: row types and queries over the sitectl schema

pub mod rows;
pub mod sqlite_repo;

pub use rows::{
    AssetData, AssetRow, AuditEntry, AuditFilter, AuditOperation, AuditPage, ComponentData,
    ComponentRow, EnvironmentRow, NewAuditEntry, PageData, PageRow, ReleaseRow, ReleaseStatus,
    ResourceTable, StyleBundleData, StyleBundleRow, StyleFile, WebsiteData, WebsiteIconData,
    WebsiteIconRow, WebsiteRow, DEFAULT_AUDIT_LIMIT, MAX_AUDIT_LIMIT,
};
pub use sqlite_repo::SqliteRepo;
