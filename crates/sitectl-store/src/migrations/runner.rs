//! Migration runner

#![allow(clippy::result_large_err)]

use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};
use crate::migrations::checksums::compute_checksum;
use crate::migrations::embedded::{get_migrations, Migration};
use rusqlite::{params, Connection};
use std::collections::HashMap;

const HISTORY_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    seq INTEGER PRIMARY KEY,
    migration_id TEXT NOT NULL UNIQUE,
    checksum TEXT NOT NULL,
    applied_at INTEGER NOT NULL
)";

/// Bring the schema up to date and return the ids applied by this call.
///
/// Every recorded migration is checked against the embedded SQL before
/// anything new runs, so an edited migration never gets a successor.
pub fn apply_migrations(conn: &mut Connection) -> Result<Vec<&'static str>> {
    conn.execute(HISTORY_DDL, []).map_err(from_rusqlite)?;
    let recorded = recorded_checksums(conn)?;
    let migrations = get_migrations();

    let mut pending = Vec::new();
    for migration in &migrations {
        let checksum = compute_checksum(migration.sql);
        match recorded.get(migration.id) {
            Some(seen) if *seen != checksum => {
                return Err(checksum_mismatch(migration.id, seen, &checksum));
            }
            Some(_) => {}
            None => pending.push((migration, checksum)),
        }
    }

    let mut applied = Vec::with_capacity(pending.len());
    for (migration, checksum) in pending {
        run_one(conn, migration, &checksum)?;
        applied.push(migration.id);
    }
    if !applied.is_empty() {
        tracing::debug!(count = applied.len(), "schema migrated");
    }
    Ok(applied)
}

/// Migration ids recorded in `schema_migrations`, oldest first
pub fn applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT migration_id FROM schema_migrations ORDER BY seq")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(from_rusqlite)?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)
}

fn recorded_checksums(conn: &Connection) -> Result<HashMap<String, String>> {
    let mut stmt = conn
        .prepare("SELECT migration_id, checksum FROM schema_migrations")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(from_rusqlite)?;
    rows.collect::<std::result::Result<HashMap<_, _>, _>>()
        .map_err(from_rusqlite)
}

fn run_one(conn: &mut Connection, migration: &Migration, checksum: &str) -> Result<()> {
    let tx = conn.transaction().map_err(from_rusqlite)?;
    tx.execute_batch(migration.sql)
        .map_err(|e| migration_error(migration.id, &e.to_string()))?;
    tx.execute(
        "INSERT INTO schema_migrations (migration_id, checksum, applied_at) VALUES (?1, ?2, ?3)",
        params![migration.id, checksum, chrono::Utc::now().timestamp_millis()],
    )
    .map_err(from_rusqlite)?;
    tx.commit().map_err(from_rusqlite)?;
    tracing::debug!(migration_id = migration.id, "applied migration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_applies_everything_in_order() {
        let mut conn = Connection::open_in_memory().unwrap();

        let applied = apply_migrations(&mut conn).unwrap();

        assert_eq!(
            applied,
            vec!["001_initial_schema", "002_website_metadata_and_icons", "003_audit_log"]
        );
        assert_eq!(applied_migrations(&conn).unwrap(), applied);
    }

    #[test]
    fn test_second_run_applies_nothing() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();

        assert!(apply_migrations(&mut conn).unwrap().is_empty());
        assert_eq!(applied_migrations(&conn).unwrap().len(), 3);
    }

    #[test]
    fn test_edited_migration_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn.execute(
            "UPDATE schema_migrations SET checksum = 'bogus' WHERE migration_id = '001_initial_schema'",
            [],
        )
        .unwrap();

        let err = apply_migrations(&mut conn).unwrap_err();
        assert!(err.message().contains("Checksum mismatch"));
    }
}
