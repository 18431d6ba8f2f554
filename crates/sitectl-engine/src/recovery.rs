//! Startup recovery
//!
//! A crash between finalizing a release directory and committing its row,
//! or between the pointer switch and the database update, leaves the disk
//! and the database disagreeing. `recover` walks every known environment
//! and repairs it: scratch directories go, finalized directories without a
//! release row go, and `current` is made to match the database.

use crate::lock::EnvLock;
use crate::release::fsutil::{io_at, remove_dir_if_exists};
use crate::release::layout::{EnvLayout, TMP_SUFFIX};
use crate::release::pointer::{read_current_release, set_current_target, switch_current};
use rusqlite::Connection;
use serde::Serialize;
use sitectl_core::errors::Result;
use sitectl_store::repo::{EnvironmentRow, SqliteRepo};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Temp release directories, build scratch and stray pointer temps
    pub removed_scratch: Vec<String>,
    /// Finalized release directories with no release row
    pub removed_orphans: Vec<String>,
    /// `<website>/<env>` pairs whose pointer was rewritten
    pub repointed: Vec<String>,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.removed_scratch.is_empty() && self.removed_orphans.is_empty() && self.repointed.is_empty()
    }
}

pub fn recover(conn: &Connection, websites_root: &Path) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();
    for (website, env) in SqliteRepo::list_all_environments(conn)? {
        let layout = EnvLayout::new(websites_root, &website, &env.name);
        if !layout.env_dir().is_dir() {
            continue;
        }
        let _lock = EnvLock::acquire(&layout)?;
        recover_environment(conn, &website, &env, &layout, &mut report)?;
    }
    Ok(report)
}

fn recover_environment(
    conn: &Connection,
    website: &str,
    env: &EnvironmentRow,
    layout: &EnvLayout,
    report: &mut RecoveryReport,
) -> Result<()> {
    let stray_tmp = layout.current_tmp_link();
    if fs::symlink_metadata(&stray_tmp).is_ok() {
        fs::remove_file(&stray_tmp).map_err(|e| io_at("recover", &stray_tmp, e))?;
        report.removed_scratch.push(display(&stray_tmp));
    }

    for path in list_dir(&layout.build_root())? {
        remove_entry(&path)?;
        report.removed_scratch.push(display(&path));
    }

    for path in list_dir(&layout.releases_root())? {
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if name.ends_with(TMP_SUFFIX) {
            remove_entry(&path)?;
            report.removed_scratch.push(display(&path));
            continue;
        }
        if env.active_release_id.as_deref() == Some(name.as_str()) {
            continue;
        }
        let known = SqliteRepo::get_release(conn, &name)?
            .map(|row| row.environment_id == env.id && !row.is_failed())
            .unwrap_or(false);
        if !known {
            remove_entry(&path)?;
            tracing::warn!(website, environment = %env.name, release_id = %name, "removed orphaned release directory");
            report.removed_orphans.push(display(&path));
        }
    }

    let on_disk = read_current_release(layout)?;
    if on_disk == env.active_release_id {
        return Ok(());
    }
    match env.active_release_id.as_deref() {
        Some(active) if layout.release_dir(active).is_dir() => switch_current(layout, active)?,
        Some(active) => {
            tracing::warn!(
                website,
                environment = %env.name,
                release_id = active,
                "active release directory is missing; pointer left unchanged"
            );
            return Ok(());
        }
        None => set_current_target(layout, None)?,
    }
    tracing::info!(
        website,
        environment = %env.name,
        from = ?on_disk,
        to = ?env.active_release_id,
        "repointed current"
    );
    report.repointed.push(format!("{}/{}", website, env.name));
    Ok(())
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_at("recover", dir, e)),
    };
    let mut paths = Vec::new();
    for entry in entries {
        paths.push(entry.map_err(|e| io_at("recover", dir, e))?.path());
    }
    paths.sort();
    Ok(paths)
}

fn remove_entry(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|e| io_at("recover", path, e))?;
    if meta.is_dir() {
        remove_dir_if_exists(path)?;
    } else {
        fs::remove_file(path).map_err(|e| io_at("recover", path, e))?;
    }
    Ok(())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
