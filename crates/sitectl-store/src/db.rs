//! Connection setup for the control-plane database

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use crate::migrations::apply_migrations;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Foreign keys on, WAL journal, and a busy timeout so a second process
/// waits for the writer instead of failing with `SQLITE_BUSY`.
pub fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(from_rusqlite)?;
    // In-memory databases answer "memory"; the reported mode is not checked
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
        .map_err(from_rusqlite)?;
    conn.busy_timeout(BUSY_TIMEOUT).map_err(from_rusqlite)
}

fn ready(mut conn: Connection) -> Result<Connection> {
    configure(&conn)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

/// Open the database file at `path`, configure it and bring the schema up to date
pub fn open_and_migrate<P: AsRef<Path>>(path: P) -> Result<Connection> {
    ready(Connection::open(path).map_err(from_rusqlite)?)
}

/// In-memory equivalent of [`open_and_migrate`], used by tests
pub fn open_in_memory_migrated() -> Result<Connection> {
    ready(Connection::open_in_memory().map_err(from_rusqlite)?)
}
