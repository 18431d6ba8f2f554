//! Release builder
//!
//! Snapshots desired state from SQLite, materializes it into a scratch source
//! tree, renders a complete static release next to the live one, and
//! activates it by swapping the `current` pointer. Every filesystem step
//! registers its compensation on a [`CleanupStack`], so a failure at any
//! point leaves the previous release serving and an audit row behind.

#![allow(clippy::result_large_err)]

pub mod materialize;
pub mod og;
pub mod snapshot;

use crate::release::fsutil::{io_at, remove_dir_if_exists, write_file};
use crate::release::outputs::{compute_output_hashes, write_release_metadata, BUILD_LOG_FILE};
use crate::release::pointer::{read_current_target, set_current_target, switch_current};
use crate::release::{new_release_id, BuildLog, CleanupStack, EnvLayout, OutputHashes};
use materialize::{default_style_refs, materialize_source};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use sitectl_core::errors::{Result, SiteError, SiteErrorKind};
use sitectl_core::names::{sanitize_rel_path, validate_name};
use sitectl_core::og::{DisabledImageGenerator, ImageGenerator};
use sitectl_core::site::seo::{self, ROBOTS_FILE, SITEMAP_FILE};
use sitectl_core::site::{FsSiteLoader, HtmlRenderer, Renderer, SiteLoader};
use sitectl_store::errors::from_rusqlite;
use sitectl_store::repo::{ReleaseRow, ReleaseStatus};
use sitectl_store::{BlobStore, SqliteRepo};
use snapshot::DesiredState;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Pluggable collaborators used to turn a source tree into a release
#[derive(Clone)]
pub struct SiteToolchain {
    pub loader: Arc<dyn SiteLoader>,
    pub renderer: Arc<dyn Renderer>,
    pub images: Arc<dyn ImageGenerator>,
}

impl Default for SiteToolchain {
    fn default() -> Self {
        Self {
            loader: Arc::new(FsSiteLoader),
            renderer: Arc::new(HtmlRenderer),
            images: Arc::new(DisabledImageGenerator),
        }
    }
}

impl SiteToolchain {
    pub fn with_loader(mut self, loader: Arc<dyn SiteLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_images(mut self, images: Arc<dyn ImageGenerator>) -> Self {
        self.images = images;
        self
    }
}

impl std::fmt::Debug for SiteToolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteToolchain").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub release_id: String,
    pub website: String,
    pub environment: String,
    pub previous_release_id: Option<String>,
    pub release_dir: PathBuf,
    pub output_hashes: OutputHashes,
    pub manifest_json: String,
    pub build_log: String,
}

#[derive(Debug, Clone)]
pub struct Builder {
    blobs: BlobStore,
    websites_root: PathBuf,
    toolchain: SiteToolchain,
}

/// Identity of the release being built, carried into failure recording
struct Attempt<'a> {
    release_id: &'a str,
    environment_id: i64,
}

impl Builder {
    pub fn new(blobs: BlobStore, websites_root: impl Into<PathBuf>, toolchain: SiteToolchain) -> Self {
        Self {
            blobs,
            websites_root: websites_root.into(),
            toolchain,
        }
    }

    /// Build and activate a new release for `website`/`environment`
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown website or environment, `InvalidInput` when
    /// the desired state cannot be built, `AlreadyExists` on a release id
    /// collision, and storage or collaborator errors. Any failure after the
    /// release id is generated leaves a `failed` release row.
    pub fn build(&self, conn: &mut Connection, website: &str, environment: &str) -> Result<BuildResult> {
        validate_name("website name", website)?;
        validate_name("environment name", environment)?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(from_rusqlite)?;
        let website_row = SqliteRepo::get_website_by_name(&tx, website)?.ok_or_else(|| {
            SiteError::not_found(format!("website {:?} not found", website))
                .with_op("build")
                .with_website(website)
        })?;
        let env_row = SqliteRepo::get_environment(&tx, website_row.id, environment)?.ok_or_else(|| {
            SiteError::not_found(format!("environment {:?} not found", environment))
                .with_op("build")
                .with_website(website)
                .with_environment(environment)
        })?;

        let release_id = new_release_id();
        let attempt = Attempt {
            release_id: &release_id,
            environment_id: env_row.id,
        };
        let previous_release_id = env_row.active_release_id.clone();
        let mut log = BuildLog::new();
        log.add(format!(
            "starting release build website={} env={} release={}",
            website, environment, release_id
        ));

        let loaded = DesiredState::load(&tx, website_row, env_row)
            .and_then(|state| tx.commit().map(|()| state).map_err(from_rusqlite));
        let state = match loaded {
            Ok(state) => state,
            Err(err) => return Err(record_failed(conn, &attempt, "{}", &mut log, err)),
        };

        let manifest_json = match state.snapshot(&release_id).and_then(|s| s.to_json()) {
            Ok(json) => json,
            Err(err) => return Err(record_failed(conn, &attempt, "{}", &mut log, err)),
        };

        let layout = EnvLayout::new(&self.websites_root, website, environment);
        let output_hashes = match self.run(conn, &layout, &state, &release_id, &manifest_json, &mut log) {
            Ok(hashes) => hashes,
            Err(err) => {
                let err = err
                    .with_website(website)
                    .with_environment(environment)
                    .with_release_id(release_id.clone());
                return Err(record_failed(conn, &attempt, &manifest_json, &mut log, err));
            }
        };

        Ok(BuildResult {
            release_dir: layout.release_dir(&release_id),
            release_id,
            website: website.to_string(),
            environment: environment.to_string(),
            previous_release_id,
            output_hashes,
            manifest_json,
            build_log: log.render(),
        })
    }

    /// Filesystem and activation steps. The cleanup stack unwinds when this
    /// returns early, before the caller records the failure.
    fn run(
        &self,
        conn: &mut Connection,
        layout: &EnvLayout,
        state: &DesiredState,
        release_id: &str,
        manifest_json: &str,
        log: &mut BuildLog,
    ) -> Result<OutputHashes> {
        let releases_root = layout.releases_root();
        let build_root = layout.build_root();
        fs::create_dir_all(&releases_root).map_err(|e| io_at("build", &releases_root, e))?;
        fs::create_dir_all(&build_root).map_err(|e| io_at("build", &build_root, e))?;

        let final_dir = layout.release_dir(release_id);
        if final_dir.exists() {
            return Err(SiteError::new(SiteErrorKind::AlreadyExists)
                .with_op("build")
                .with_path(final_dir.display().to_string())
                .with_message("release directory already exists"));
        }
        let tmp_dir = layout.tmp_release_dir(release_id);
        let source_dir = layout.source_dir(release_id);
        let probe_dir = layout.og_probe_dir(release_id);
        remove_dir_if_exists(&tmp_dir)?;
        remove_dir_if_exists(&source_dir)?;
        let previous_target = read_current_target(layout)?;

        let mut cleanup = CleanupStack::new();
        {
            let (source, probe) = (source_dir.clone(), probe_dir.clone());
            cleanup.always("remove build scratch", move || {
                remove_dir_if_exists(&source)?;
                remove_dir_if_exists(&probe)?;
                Ok(())
            });
        }
        {
            let tmp = tmp_dir.clone();
            cleanup.on_failure("remove temp release", move || {
                remove_dir_if_exists(&tmp).map(|_| ())
            });
        }

        log.add("materializing source state from sqlite + blob store");
        materialize_source(&self.blobs, &source_dir, state)?;
        let mut site = self
            .toolchain
            .loader
            .load(&source_dir)
            .map_err(|e| e.context("load source site"))?;
        og::warn_local_host_urls(&site, log);

        log.add("ensuring og image blobs");
        let images = og::ensure_images(&self.blobs, self.toolchain.images.as_ref(), &site, log);
        let ready = og::preflight(&self.blobs, &images, &probe_dir, log);
        og::inject_metadata(&mut site, &ready, log);

        log.add("rendering static output");
        fs::create_dir_all(&tmp_dir).map_err(|e| io_at("build", &tmp_dir, e))?;
        self.toolchain
            .renderer
            .render(&site, &tmp_dir)
            .map_err(|e| e.context("render site"))?;
        for rel in default_style_refs(state)?.keys() {
            let bytes = fs::read(source_dir.join(rel)).map_err(|e| io_at("build", &source_dir.join(rel), e))?;
            write_file(&tmp_dir.join(rel), &bytes)?;
        }
        for row in &state.assets {
            let rel = sanitize_rel_path(&row.data.filename)?;
            let bytes = self.blobs.read(&row.data.content_hash)?;
            write_file(&tmp_dir.join(rel), &bytes)?;
        }
        for row in &state.website_icons {
            let rel = sanitize_rel_path(&row.data.source_path)?;
            let bytes = self.blobs.read(&row.data.content_hash)?;
            write_file(&tmp_dir.join(rel), &bytes)?;
        }
        og::materialize_images(&self.blobs, &tmp_dir, &ready, log);

        let seo_files = seo::generate(&site);
        for warning in &seo_files.warnings {
            log.warn(warning);
        }
        if let Some(sitemap) = &seo_files.sitemap {
            write_file(&tmp_dir.join(SITEMAP_FILE), sitemap.as_bytes())?;
        }
        if let Some(robots) = &seo_files.robots {
            write_file(&tmp_dir.join(ROBOTS_FILE), robots.as_bytes())?;
        }

        let hashes = compute_output_hashes(&tmp_dir)?;
        let hashes_json = write_release_metadata(&tmp_dir, manifest_json, &log.render(), &hashes)?;

        log.add("finalizing release directory");
        fs::rename(&tmp_dir, &final_dir).map_err(|e| io_at("finalize_release", &final_dir, e))?;
        {
            let dir = final_dir.clone();
            cleanup.on_failure("remove finalized release", move || {
                remove_dir_if_exists(&dir).map(|_| ())
            });
        }

        log.add("switching current symlink");
        switch_current(layout, release_id)?;
        {
            let layout = layout.clone();
            cleanup.on_failure("restore current pointer", move || {
                set_current_target(&layout, previous_target.as_deref())
            });
        }

        // The copy inside the release must match the row and the result
        log.add("release build completed");
        let build_log = log.render();
        write_file(&final_dir.join(BUILD_LOG_FILE), build_log.as_bytes())?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(from_rusqlite)?;
        SqliteRepo::insert_release(
            &tx,
            &ReleaseRow {
                id: release_id.to_string(),
                environment_id: state.environment.id,
                manifest_json: manifest_json.to_string(),
                output_hashes_json: hashes_json,
                build_log,
                status: ReleaseStatus::Active,
                created_at: chrono::Utc::now().timestamp_millis(),
            },
        )?;
        SqliteRepo::set_active_release(&tx, state.environment.id, Some(release_id))?;
        tx.commit().map_err(from_rusqlite)?;
        cleanup.complete();

        Ok(hashes)
    }
}

/// Append the failure to the log and leave a `failed` audit row, unless a
/// row with this id already exists. Returns the original error.
fn record_failed(
    conn: &Connection,
    attempt: &Attempt<'_>,
    manifest_json: &str,
    log: &mut BuildLog,
    err: SiteError,
) -> SiteError {
    log.add(format!("release build failed: {}", err));
    let existing = match SqliteRepo::get_release(conn, attempt.release_id) {
        Ok(existing) => existing,
        Err(lookup) => {
            tracing::error!(release_id = attempt.release_id, error = %lookup, "failed to look up release for audit row");
            return err;
        }
    };
    if existing.is_some() {
        return err;
    }
    let row = ReleaseRow {
        id: attempt.release_id.to_string(),
        environment_id: attempt.environment_id,
        manifest_json: manifest_json.to_string(),
        output_hashes_json: "{}".to_string(),
        build_log: log.render(),
        status: ReleaseStatus::Failed,
        created_at: chrono::Utc::now().timestamp_millis(),
    };
    if let Err(insert) = SqliteRepo::insert_release(conn, &row) {
        tracing::error!(release_id = attempt.release_id, error = %insert, "failed to record failed release");
    }
    err
}
