//! `ReleaseEngine`: the public facade over every release operation
//!
//! Owns the SQLite connection, blob store, websites root and site
//! toolchain. Every operation logs one start event and one end or
//! end_error event; build, rollback and promotion hold the environment
//! lock for their whole duration. Committed mutations are appended to
//! the audit log.

#![allow(clippy::result_large_err)]

use crate::audit::{self, DEFAULT_ACTOR};
use crate::commands::apply::{Applier, ApplyResult};
use crate::commands::build::{BuildResult, Builder, SiteToolchain};
use crate::commands::promote::{PromoteResult, Promoter};
use crate::commands::rollback::{rollback, RollbackResult};
use crate::lock::{acquire_ordered, EnvLock};
use crate::recovery::{recover, RecoveryReport};
use crate::release::EnvLayout;
use rusqlite::Connection;
use serde::Serialize;
use sitectl_core::bundle::Bundle;
use sitectl_core::config::Config;
use sitectl_core::errors::{Result, SiteError};
use sitectl_core::names::validate_name;
use sitectl_core::{log_op_end, log_op_error, log_op_start};
use sitectl_core_types::schema::{
    OP_APPLY, OP_BUILD, OP_PROMOTE, OP_RECOVER, OP_ROLLBACK,
};
use sitectl_store::repo::{
    AuditFilter, AuditOperation, AuditPage, EnvironmentRow, ReleaseStatus, SqliteRepo,
};
use sitectl_store::{db, BlobStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// One row of an environment's release history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSummary {
    pub id: String,
    pub status: ReleaseStatus,
    pub created_at: i64,
    pub active: bool,
}

pub struct ReleaseEngine {
    conn: Connection,
    blobs: BlobStore,
    websites_root: PathBuf,
    toolchain: SiteToolchain,
    actor: String,
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

impl ReleaseEngine {
    pub fn new(
        conn: Connection,
        blobs: BlobStore,
        websites_root: impl Into<PathBuf>,
        toolchain: SiteToolchain,
    ) -> Self {
        Self {
            conn,
            blobs,
            websites_root: websites_root.into(),
            toolchain,
            actor: DEFAULT_ACTOR.to_string(),
        }
    }

    /// Actor recorded on audit entries
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Open (and migrate) the database and create the data directories
    /// named by `config`
    ///
    /// # Errors
    ///
    /// Fails when a directory cannot be created or the database cannot be
    /// opened or migrated.
    pub fn open(config: &Config, toolchain: SiteToolchain) -> Result<Self> {
        let db_path = config.resolve_db_path();
        let blobs_dir = config.resolve_blobs_dir();
        let websites_root = config.resolve_websites_root();
        for dir in [db_path.parent(), Some(blobs_dir.as_path()), Some(websites_root.as_path())]
            .into_iter()
            .flatten()
        {
            fs::create_dir_all(dir).map_err(|e| {
                SiteError::from(e)
                    .with_op("open_engine")
                    .with_path(dir.display().to_string())
            })?;
        }
        let conn = db::open_and_migrate(&db_path)?;
        Ok(Self::new(conn, BlobStore::new(blobs_dir), websites_root, toolchain).with_actor(config.actor.clone()))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn websites_root(&self) -> &Path {
        &self.websites_root
    }

    fn layout(&self, website: &str, environment: &str) -> Result<EnvLayout> {
        validate_name("website name", website)?;
        validate_name("environment name", environment)?;
        Ok(EnvLayout::new(&self.websites_root, website, environment))
    }

    /// # Errors
    ///
    /// See [`Applier::apply`].
    pub fn apply(
        &mut self,
        website: &str,
        environment: &str,
        bundle: &Bundle,
        dry_run: bool,
    ) -> Result<ApplyResult> {
        let start = Instant::now();
        log_op_start!(OP_APPLY, website = website, environment = environment, dry_run = dry_run);

        let result = Applier::new(self.blobs.clone())
            .apply(&mut self.conn, website, environment, bundle, dry_run)
            .map_err(|e| {
                log_op_error!(OP_APPLY, e, duration_ms = elapsed_ms(start), website = website, environment = environment);
                e
            })?;

        log_op_end!(
            OP_APPLY,
            duration_ms = elapsed_ms(start),
            website = website,
            environment = environment,
            created = result.created,
            updated = result.updated,
            deleted = result.deleted,
            dry_run = dry_run
        );
        audit::record(&self.conn, &self.actor, website, environment, audit::for_apply(&result));
        Ok(result)
    }

    /// # Errors
    ///
    /// See [`Builder::build`]; also `Concurrency` when the lock fails.
    pub fn build(&mut self, website: &str, environment: &str) -> Result<BuildResult> {
        let start = Instant::now();
        log_op_start!(OP_BUILD, website = website, environment = environment);

        let result = self
            .layout(website, environment)
            .and_then(|layout| EnvLock::acquire(&layout))
            .and_then(|_lock| {
                Builder::new(self.blobs.clone(), self.websites_root.clone(), self.toolchain.clone())
                    .build(&mut self.conn, website, environment)
            })
            .map_err(|e| {
                log_op_error!(OP_BUILD, e, duration_ms = elapsed_ms(start), website = website, environment = environment);
                e
            })?;

        for line in result.build_log.lines().filter(|l| l.contains("warning:")) {
            tracing::debug!(release_id = %result.release_id, line, "build warning");
        }
        log_op_end!(
            OP_BUILD,
            duration_ms = elapsed_ms(start),
            website = website,
            environment = environment,
            release_id = result.release_id.as_str()
        );
        audit::record(&self.conn, &self.actor, website, environment, audit::for_build(&result));
        Ok(result)
    }

    /// # Errors
    ///
    /// See [`rollback`]; also `Concurrency` when the lock fails.
    pub fn rollback(&mut self, website: &str, environment: &str) -> Result<RollbackResult> {
        let start = Instant::now();
        log_op_start!(OP_ROLLBACK, website = website, environment = environment);

        let result = self
            .layout(website, environment)
            .and_then(|layout| EnvLock::acquire(&layout))
            .and_then(|_lock| rollback(&mut self.conn, &self.websites_root, website, environment))
            .map_err(|e| {
                log_op_error!(OP_ROLLBACK, e, duration_ms = elapsed_ms(start), website = website, environment = environment);
                e
            })?;

        log_op_end!(
            OP_ROLLBACK,
            duration_ms = elapsed_ms(start),
            website = website,
            environment = environment,
            release_id = result.to_release_id.as_str()
        );
        audit::record(&self.conn, &self.actor, website, environment, audit::for_rollback(&result));
        Ok(result)
    }

    /// Both environments are locked, in name order, for the whole copy
    ///
    /// # Errors
    ///
    /// See [`Promoter::promote`]; also `Concurrency` when a lock fails.
    pub fn promote(&mut self, website: &str, source_env: &str, target_env: &str) -> Result<PromoteResult> {
        let start = Instant::now();
        log_op_start!(
            OP_PROMOTE,
            website = website,
            source_environment = source_env,
            target_environment = target_env
        );

        let result = self
            .layout(website, source_env)
            .and_then(|source| Ok(vec![source, self.layout(website, target_env)?]))
            .and_then(acquire_ordered)
            .and_then(|_locks| {
                Promoter::new(self.websites_root.clone()).promote(&mut self.conn, website, source_env, target_env)
            })
            .map_err(|e| {
                log_op_error!(
                    OP_PROMOTE,
                    e,
                    duration_ms = elapsed_ms(start),
                    website = website,
                    source_environment = source_env,
                    target_environment = target_env
                );
                e
            })?;

        log_op_end!(
            OP_PROMOTE,
            duration_ms = elapsed_ms(start),
            website = website,
            source_environment = source_env,
            target_environment = target_env,
            release_id = result.release_id.as_str()
        );
        audit::record(&self.conn, &self.actor, website, target_env, audit::for_promote(&result));
        Ok(result)
    }

    /// Repair every environment after an unclean shutdown
    ///
    /// # Errors
    ///
    /// Storage and filesystem errors; environments already repaired stay
    /// repaired.
    pub fn recover(&mut self) -> Result<RecoveryReport> {
        let start = Instant::now();
        log_op_start!(OP_RECOVER);

        let report = recover(&self.conn, &self.websites_root).map_err(|e| {
            log_op_error!(OP_RECOVER, e, duration_ms = elapsed_ms(start));
            e
        })?;

        log_op_end!(
            OP_RECOVER,
            duration_ms = elapsed_ms(start),
            removed_scratch = report.removed_scratch.len(),
            removed_orphans = report.removed_orphans.len(),
            repointed = report.repointed.len()
        );
        Ok(report)
    }

    fn website_id(&self, op: &str, website: &str) -> Result<i64> {
        validate_name("website name", website)?;
        SqliteRepo::get_website_by_name(&self.conn, website)?
            .map(|row| row.id)
            .ok_or_else(|| {
                SiteError::not_found(format!("website {:?} not found", website))
                    .with_op(op.to_string())
                    .with_website(website)
            })
    }

    fn environment_row(&self, op: &str, website: &str, environment: &str) -> Result<EnvironmentRow> {
        validate_name("environment name", environment)?;
        let website_id = self.website_id(op, website)?;
        SqliteRepo::get_environment(&self.conn, website_id, environment)?.ok_or_else(|| {
            SiteError::not_found(format!("environment {:?} not found", environment))
                .with_op(op.to_string())
                .with_website(website)
                .with_environment(environment)
        })
    }

    /// Release history of an environment, newest first
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown website or environment.
    pub fn releases(&self, website: &str, environment: &str) -> Result<Vec<ReleaseSummary>> {
        let env = self.environment_row("releases", website, environment)?;
        Ok(SqliteRepo::list_releases(&self.conn, env.id)?
            .into_iter()
            .map(|row| ReleaseSummary {
                active: env.active_release_id.as_deref() == Some(row.id.as_str()),
                id: row.id,
                status: row.status,
                created_at: row.created_at,
            })
            .collect())
    }

    /// Audit entries of a website, or of one of its environments, newest
    /// first. A non-positive `limit` means the default page size.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown website or environment.
    pub fn audit_log(
        &self,
        website: &str,
        environment: Option<&str>,
        operation: Option<AuditOperation>,
        limit: i64,
        offset: i64,
    ) -> Result<AuditPage> {
        let website_id = self.website_id("logs", website)?;
        let environment_id = environment
            .map(|name| self.environment_row("logs", website, name).map(|env| env.id))
            .transpose()?;
        SqliteRepo::list_audit(
            &self.conn,
            &AuditFilter {
                website_id,
                environment_id,
                operation,
                limit,
                offset,
                ..Default::default()
            },
        )
    }
}
