//! Promote an environment's active release into another environment
//!
//! The source tree is copied (hardlinks where the filesystem allows) into a
//! temp directory of the target, re-hashed independently and compared with
//! the source's recorded hashes before anything is activated.

#![allow(clippy::result_large_err)]

use crate::release::fsutil::{copy_symlink, io_at, link_or_copy, remove_dir_if_exists, Placement};
use crate::release::outputs::{
    compare_hashes, compute_output_hashes, is_release_metadata_file, parse_output_hashes,
    tree_digest, write_release_metadata,
};
use crate::release::pointer::{read_current_target, set_current_target, switch_current};
use crate::release::{new_release_id, BuildLog, CleanupStack, EnvLayout, OutputHashes};
use crate::commands::build::snapshot::now_rfc3339;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use serde_json::Value;
use sitectl_core::errors::{Result, SiteError, SiteErrorKind};
use sitectl_core::names::validate_name;
use sitectl_store::errors::from_rusqlite;
use sitectl_store::repo::{ReleaseRow, ReleaseStatus};
use sitectl_store::SqliteRepo;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How promoted files reached the target tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CopyStrategy {
    #[serde(rename = "hardlink")]
    Hardlink,
    #[serde(rename = "copy")]
    Copy,
    #[serde(rename = "hardlink+copy")]
    Mixed,
}

impl CopyStrategy {
    fn from_counts(hardlinks: usize, copies: usize) -> Self {
        match (hardlinks, copies) {
            (_, 0) => CopyStrategy::Hardlink,
            (0, _) => CopyStrategy::Copy,
            _ => CopyStrategy::Mixed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CopyStrategy::Hardlink => "hardlink",
            CopyStrategy::Copy => "copy",
            CopyStrategy::Mixed => "hardlink+copy",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteResult {
    pub website: String,
    pub source_environment: String,
    pub target_environment: String,
    pub source_release_id: String,
    pub release_id: String,
    pub previous_release_id: Option<String>,
    pub strategy: CopyStrategy,
    pub file_count: usize,
    /// `sha256:` digest over the target tree's `path\ndigest\n` pairs
    pub hash: String,
}

#[derive(Debug, Default)]
struct CopyStats {
    hardlinks: usize,
    copies: usize,
    symlinks: usize,
}

impl CopyStats {
    fn file_count(&self) -> usize {
        self.hardlinks + self.copies + self.symlinks
    }
}

#[derive(Debug, Clone)]
pub struct Promoter {
    websites_root: PathBuf,
}

fn promote_error(kind: SiteErrorKind, website: &str, message: impl Into<String>) -> SiteError {
    SiteError::new(kind)
        .with_op("promote")
        .with_website(website)
        .with_message(message)
}

impl Promoter {
    pub fn new(websites_root: impl Into<PathBuf>) -> Self {
        Self {
            websites_root: websites_root.into(),
        }
    }

    /// # Errors
    ///
    /// `InvalidInput` when source and target are the same environment,
    /// `NotFound` for an unknown website or environment and when the source
    /// has no active release,
    /// `IntegrityViolation` when the active release row is missing or
    /// belongs elsewhere, `MissingReleaseDir` when its directory is gone and
    /// `HashMismatch` when the copied tree differs from the source.
    pub fn promote(
        &self,
        conn: &mut Connection,
        website: &str,
        source_env: &str,
        target_env: &str,
    ) -> Result<PromoteResult> {
        validate_name("website name", website)?;
        validate_name("environment name", source_env)?;
        validate_name("environment name", target_env)?;
        if source_env == target_env {
            return Err(promote_error(
                SiteErrorKind::InvalidInput,
                website,
                "source and target environments must differ",
            )
            .with_environment(source_env));
        }

        let website_row = SqliteRepo::get_website_by_name(conn, website)?.ok_or_else(|| {
            promote_error(SiteErrorKind::NotFound, website, format!("website {:?} not found", website))
        })?;
        let source_row = SqliteRepo::get_environment(conn, website_row.id, source_env)?.ok_or_else(|| {
            promote_error(
                SiteErrorKind::NotFound,
                website,
                format!("environment {:?} not found", source_env),
            )
            .with_environment(source_env)
        })?;
        let target_row = SqliteRepo::get_environment(conn, website_row.id, target_env)?.ok_or_else(|| {
            promote_error(
                SiteErrorKind::NotFound,
                website,
                format!("environment {:?} not found", target_env),
            )
            .with_environment(target_env)
        })?;
        let source_release_id = source_row.active_release_id.clone().ok_or_else(|| {
            promote_error(
                SiteErrorKind::NotFound,
                website,
                format!("environment {:?} has no active release", source_env),
            )
            .with_environment(source_env)
        })?;
        let source_release = SqliteRepo::get_release(conn, &source_release_id)?
            .filter(|r| r.environment_id == source_row.id)
            .ok_or_else(|| {
                promote_error(
                    SiteErrorKind::IntegrityViolation,
                    website,
                    format!(
                        "active release {} has no matching row for environment {:?}",
                        source_release_id, source_env
                    ),
                )
                .with_environment(source_env)
                .with_release_id(source_release_id.clone())
            })?;

        let source_layout = EnvLayout::new(&self.websites_root, website, source_env);
        let source_dir = source_layout.release_dir(&source_release_id);
        if !source_dir.is_dir() {
            return Err(promote_error(
                SiteErrorKind::MissingReleaseDir,
                website,
                format!("release directory for {} is missing", source_release_id),
            )
            .with_environment(source_env)
            .with_path(source_dir.display().to_string()));
        }
        let mut source_hashes = parse_output_hashes(&source_release.output_hashes_json)?;
        if source_hashes.is_empty() {
            source_hashes = compute_output_hashes(&source_dir)?;
        }

        let previous_release_id = target_row.active_release_id.clone();
        let target_layout = EnvLayout::new(&self.websites_root, website, target_env);
        let release_id = new_release_id();

        let staged = Staged {
            source_dir: &source_dir,
            source_hashes: &source_hashes,
            source_release: &source_release,
            source_env,
            target_env,
        };
        let (stats, target_hashes) = self
            .activate(conn, target_row.id, &target_layout, &release_id, &staged)
            .map_err(|e| {
                e.with_website(website)
                    .with_environment(target_env)
                    .with_release_id(release_id.clone())
            })?;

        Ok(PromoteResult {
            website: website.to_string(),
            source_environment: source_env.to_string(),
            target_environment: target_env.to_string(),
            source_release_id,
            release_id,
            previous_release_id,
            strategy: CopyStrategy::from_counts(stats.hardlinks, stats.copies),
            file_count: stats.file_count(),
            hash: tree_digest(&target_hashes),
        })
    }

    fn activate(
        &self,
        conn: &mut Connection,
        target_env_id: i64,
        layout: &EnvLayout,
        release_id: &str,
        staged: &Staged<'_>,
    ) -> Result<(CopyStats, OutputHashes)> {
        let releases_root = layout.releases_root();
        fs::create_dir_all(&releases_root).map_err(|e| io_at("promote", &releases_root, e))?;
        let final_dir = layout.release_dir(release_id);
        if final_dir.exists() {
            return Err(SiteError::new(SiteErrorKind::AlreadyExists)
                .with_op("promote")
                .with_path(final_dir.display().to_string())
                .with_message("release directory already exists"));
        }
        let tmp_dir = layout.tmp_release_dir(release_id);
        remove_dir_if_exists(&tmp_dir)?;

        let mut cleanup = CleanupStack::new();
        {
            let tmp = tmp_dir.clone();
            cleanup.on_failure("remove temp release", move || {
                remove_dir_if_exists(&tmp).map(|_| ())
            });
        }

        let stats = copy_tree(staged.source_dir, &tmp_dir)?;
        let target_hashes = compute_output_hashes(&tmp_dir)?;
        if let Some(diff) = compare_hashes(staged.source_hashes, &target_hashes) {
            return Err(SiteError::new(SiteErrorKind::HashMismatch)
                .with_op("promote")
                .with_message(format!("promoted tree differs from source: {}", diff)));
        }

        let manifest_json = rewrite_manifest(
            &staged.source_release.manifest_json,
            release_id,
            &staged.source_release.id,
            staged.source_env,
            staged.target_env,
        )?;
        let mut log = BuildLog::new();
        log.add(format!(
            "promoted release {} from {} to {}",
            staged.source_release.id, staged.source_env, staged.target_env
        ));
        let build_log = log.render();
        let hashes_json = write_release_metadata(&tmp_dir, &manifest_json, &build_log, &target_hashes)?;

        fs::rename(&tmp_dir, &final_dir).map_err(|e| io_at("finalize_release", &final_dir, e))?;
        {
            let dir = final_dir.clone();
            cleanup.on_failure("remove finalized release", move || {
                remove_dir_if_exists(&dir).map(|_| ())
            });
        }

        let previous_target = read_current_target(layout)?;
        switch_current(layout, release_id)?;
        {
            let layout = layout.clone();
            cleanup.on_failure("restore current pointer", move || {
                set_current_target(&layout, previous_target.as_deref())
            });
        }

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(from_rusqlite)?;
        SqliteRepo::insert_release(
            &tx,
            &ReleaseRow {
                id: release_id.to_string(),
                environment_id: target_env_id,
                manifest_json,
                output_hashes_json: hashes_json,
                build_log,
                status: ReleaseStatus::Active,
                created_at: chrono::Utc::now().timestamp_millis(),
            },
        )?;
        SqliteRepo::set_active_release(&tx, target_env_id, Some(release_id))?;
        tx.commit().map_err(from_rusqlite)?;
        cleanup.complete();

        Ok((stats, target_hashes))
    }
}

struct Staged<'a> {
    source_dir: &'a Path,
    source_hashes: &'a OutputHashes,
    source_release: &'a ReleaseRow,
    source_env: &'a str,
    target_env: &'a str,
}

/// Mirror `src` into `dst`: hardlink files (copy on failure), recreate
/// symlinks, skip release metadata
fn copy_tree(src: &Path, dst: &Path) -> Result<CopyStats> {
    fs::create_dir_all(dst).map_err(|e| io_at("promote", dst, e))?;
    let mut stats = CopyStats::default();
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            SiteError::new(SiteErrorKind::Io)
                .with_op("promote")
                .with_path(src.display().to_string())
                .with_message(e.to_string())
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| SiteError::internal(e.to_string()).with_op("promote"))?;
        if is_release_metadata_file(&rel.to_string_lossy().replace('\\', "/")) {
            continue;
        }
        let target = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| io_at("promote", &target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            stats.symlinks += 1;
        } else {
            match link_or_copy(entry.path(), &target)? {
                Placement::Hardlink => stats.hardlinks += 1,
                Placement::Copy => stats.copies += 1,
            }
        }
    }
    Ok(stats)
}

/// Re-stamp the source manifest for the target environment
fn rewrite_manifest(
    source_manifest: &str,
    release_id: &str,
    source_release_id: &str,
    source_env: &str,
    target_env: &str,
) -> Result<String> {
    let mut manifest: Value = if source_manifest.trim().is_empty() {
        Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_str(source_manifest)?
    };
    if !manifest.is_object() {
        manifest = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(fields) = &mut manifest {
        fields.insert("releaseId".into(), Value::from(release_id));
        fields.insert("environment".into(), Value::from(target_env));
        fields.insert("generatedAt".into(), Value::from(now_rfc3339()));
        fields.insert("sourceReleaseId".into(), Value::from(source_release_id));
        fields.insert("sourceEnv".into(), Value::from(source_env));
    }
    Ok(serde_json::to_string_pretty(&manifest)?)
}
