// Integration tests for schema migrations against a file-backed database

use sitectl_store::db::open_and_migrate;
use sitectl_store::migrations::applied_migrations;
use tempfile::TempDir;

#[test]
fn test_open_and_migrate_creates_schema() {
    // Given: A fresh database path
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sitectl.db");

    // When: We open and migrate it
    let conn = open_and_migrate(&path).unwrap();

    // Then: Every table exists
    for table in [
        "websites",
        "environments",
        "pages",
        "components",
        "style_bundles",
        "assets",
        "website_icons",
        "releases",
        "audit_log",
    ] {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "missing table {}", table);
    }
}

#[test]
fn test_reopen_keeps_applied_migrations() {
    // Given: A migrated database
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sitectl.db");
    drop(open_and_migrate(&path).unwrap());

    // When: We open it again
    let conn = open_and_migrate(&path).unwrap();

    // Then: No migration is applied twice
    assert_eq!(
        applied_migrations(&conn).unwrap(),
        vec!["001_initial_schema", "002_website_metadata_and_icons", "003_audit_log"]
    );
}

#[test]
fn test_release_status_is_constrained() {
    let dir = TempDir::new().unwrap();
    let conn = open_and_migrate(dir.path().join("sitectl.db")).unwrap();
    conn.execute(
        "INSERT INTO websites (name, created_at, updated_at) VALUES ('sample', 0, 0)",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO environments (website_id, name, created_at, updated_at) VALUES (1, 'staging', 0, 0)",
        [],
    )
    .unwrap();

    let result = conn.execute(
        "INSERT INTO releases (id, environment_id, manifest_json, status, created_at)
         VALUES ('r1', 1, '{}', 'pending', 0)",
        [],
    );

    assert!(result.is_err());
}
