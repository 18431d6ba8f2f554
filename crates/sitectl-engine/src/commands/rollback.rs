//! Roll an environment back to its most recent earlier healthy release

#![allow(clippy::result_large_err)]

use crate::release::pointer::{read_current_target, set_current_target, switch_current};
use crate::release::{CleanupStack, EnvLayout};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use sitectl_core::errors::{Result, SiteError, SiteErrorKind};
use sitectl_core::names::validate_name;
use sitectl_store::errors::from_rusqlite;
use sitectl_store::SqliteRepo;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResult {
    pub website: String,
    pub environment: String,
    pub from_release_id: String,
    pub to_release_id: String,
}

fn rollback_error(kind: SiteErrorKind, website: &str, environment: &str, message: impl Into<String>) -> SiteError {
    SiteError::new(kind)
        .with_op("rollback")
        .with_website(website)
        .with_environment(environment)
        .with_message(message)
}

/// Point `environment` at the newest non-failed release older than the
/// active one
///
/// # Errors
///
/// `NoPreviousRelease` when there is no active release or no healthy
/// release before it; `IntegrityViolation` when the active release is
/// missing from history or the target is not a directory;
/// `MissingReleaseDir` when the target directory is gone.
pub fn rollback(
    conn: &mut Connection,
    websites_root: &Path,
    website: &str,
    environment: &str,
) -> Result<RollbackResult> {
    validate_name("website name", website)?;
    validate_name("environment name", environment)?;

    let website_row = SqliteRepo::get_website_by_name(conn, website)?.ok_or_else(|| {
        rollback_error(SiteErrorKind::NotFound, website, environment, format!("website {:?} not found", website))
    })?;
    let env_row = SqliteRepo::get_environment(conn, website_row.id, environment)?.ok_or_else(|| {
        rollback_error(
            SiteErrorKind::NotFound,
            website,
            environment,
            format!("environment {:?} not found", environment),
        )
    })?;
    let active = env_row.active_release_id.clone().ok_or_else(|| {
        rollback_error(
            SiteErrorKind::NoPreviousRelease,
            website,
            environment,
            "environment has no active release",
        )
    })?;

    let history = SqliteRepo::list_releases(conn, env_row.id)?;
    let position = history.iter().position(|r| r.id == active).ok_or_else(|| {
        rollback_error(
            SiteErrorKind::IntegrityViolation,
            website,
            environment,
            format!("active release {} is missing from release history", active),
        )
    })?;
    let target = history[position + 1..]
        .iter()
        .find(|r| !r.is_failed())
        .ok_or_else(|| {
            rollback_error(
                SiteErrorKind::NoPreviousRelease,
                website,
                environment,
                format!("no healthy release before {}", active),
            )
        })?;

    let layout = EnvLayout::new(websites_root, website, environment);
    let target_dir = layout.release_dir(&target.id);
    match fs::metadata(&target_dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(rollback_error(
                SiteErrorKind::IntegrityViolation,
                website,
                environment,
                "rollback target is not a directory",
            )
            .with_path(target_dir.display().to_string()));
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(rollback_error(
                SiteErrorKind::MissingReleaseDir,
                website,
                environment,
                format!("release directory for {} is missing", target.id),
            )
            .with_path(target_dir.display().to_string()));
        }
        Err(e) => return Err(SiteError::from(e).with_op("rollback").with_path(target_dir.display().to_string())),
    }

    let previous_target = read_current_target(&layout)?;
    switch_current(&layout, &target.id)?;
    let mut cleanup = CleanupStack::new();
    {
        let layout = layout.clone();
        cleanup.on_failure("restore current pointer", move || {
            set_current_target(&layout, previous_target.as_deref())
        });
    }

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(from_rusqlite)?;
    SqliteRepo::set_active_release(&tx, env_row.id, Some(&target.id))?;
    tx.commit().map_err(from_rusqlite)?;
    cleanup.complete();

    tracing::debug!(from = %active, to = %target.id, "rolled back");
    Ok(RollbackResult {
        website: website.to_string(),
        environment: environment.to_string(),
        from_release_id: active,
        to_release_id: target.id.clone(),
    })
}
