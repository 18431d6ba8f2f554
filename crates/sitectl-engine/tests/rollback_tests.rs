// Integration tests for rollback
// Covers failed-release skipping, missing targets and pointer/database agreement

mod common;

use common::{TestEnv, WEBSITE};
use rusqlite::Connection;
use sitectl_core::errors::SiteErrorKind;
use sitectl_engine::commands::rollback::rollback;
use sitectl_engine::release::pointer::{read_current_release, switch_current};
use sitectl_engine::release::EnvLayout;
use sitectl_store::db::open_in_memory_migrated;
use sitectl_store::repo::{ReleaseRow, ReleaseStatus};
use sitectl_store::SqliteRepo;
use std::fs;
use tempfile::TempDir;

fn release(id: &str, environment_id: i64, status: ReleaseStatus, created_at: i64) -> ReleaseRow {
    ReleaseRow {
        id: id.to_string(),
        environment_id,
        manifest_json: "{}".to_string(),
        output_hashes_json: "{}".to_string(),
        build_log: String::new(),
        status,
        created_at,
    }
}

/// History (newest first): A active, B failed, C healthy; directories for A and C
fn seeded_history() -> (TempDir, Connection, EnvLayout, i64) {
    let dir = TempDir::new().unwrap();
    let conn = open_in_memory_migrated().unwrap();
    let website = SqliteRepo::ensure_website(&conn, WEBSITE).unwrap();
    let env = SqliteRepo::ensure_environment(&conn, website.id, "staging").unwrap();
    SqliteRepo::insert_release(&conn, &release("C", env.id, ReleaseStatus::Active, 100)).unwrap();
    SqliteRepo::insert_release(&conn, &release("B", env.id, ReleaseStatus::Failed, 200)).unwrap();
    SqliteRepo::insert_release(&conn, &release("A", env.id, ReleaseStatus::Active, 300)).unwrap();
    SqliteRepo::set_active_release(&conn, env.id, Some("A")).unwrap();

    let layout = EnvLayout::new(dir.path(), WEBSITE, "staging");
    fs::create_dir_all(layout.release_dir("A")).unwrap();
    fs::create_dir_all(layout.release_dir("C")).unwrap();
    switch_current(&layout, "A").unwrap();
    (dir, conn, layout, env.id)
}

fn active_release(conn: &Connection) -> Option<String> {
    let website = SqliteRepo::get_website_by_name(conn, WEBSITE).unwrap().unwrap();
    SqliteRepo::get_environment(conn, website.id, "staging")
        .unwrap()
        .unwrap()
        .active_release_id
}

#[test]
fn test_rollback_skips_failed_releases() {
    // Given: A active, B failed, C healthy
    let (dir, mut conn, layout, _) = seeded_history();

    // When: Staging is rolled back
    let result = rollback(&mut conn, dir.path(), WEBSITE, "staging").unwrap();

    // Then: C is the target, on disk and in the database
    assert_eq!(result.from_release_id, "A");
    assert_eq!(result.to_release_id, "C");
    assert_eq!(read_current_release(&layout).unwrap().as_deref(), Some("C"));
    assert_eq!(active_release(&conn).as_deref(), Some("C"));
}

#[test]
fn test_rollback_without_healthy_predecessor_changes_nothing() {
    // Given: Only a failed release before the active one
    let dir = TempDir::new().unwrap();
    let mut conn = open_in_memory_migrated().unwrap();
    let website = SqliteRepo::ensure_website(&conn, WEBSITE).unwrap();
    let env = SqliteRepo::ensure_environment(&conn, website.id, "staging").unwrap();
    SqliteRepo::insert_release(&conn, &release("B", env.id, ReleaseStatus::Failed, 100)).unwrap();
    SqliteRepo::insert_release(&conn, &release("A", env.id, ReleaseStatus::Active, 200)).unwrap();
    SqliteRepo::set_active_release(&conn, env.id, Some("A")).unwrap();
    let layout = EnvLayout::new(dir.path(), WEBSITE, "staging");
    fs::create_dir_all(layout.release_dir("A")).unwrap();
    switch_current(&layout, "A").unwrap();

    // When: A rollback is requested
    let err = rollback(&mut conn, dir.path(), WEBSITE, "staging").unwrap_err();

    // Then: NoPreviousRelease, pointer and database untouched
    assert_eq!(err.kind(), SiteErrorKind::NoPreviousRelease);
    assert_eq!(read_current_release(&layout).unwrap().as_deref(), Some("A"));
    assert_eq!(active_release(&conn).as_deref(), Some("A"));
}

#[test]
fn test_rollback_without_active_release() {
    let dir = TempDir::new().unwrap();
    let mut conn = open_in_memory_migrated().unwrap();
    let website = SqliteRepo::ensure_website(&conn, WEBSITE).unwrap();
    SqliteRepo::ensure_environment(&conn, website.id, "staging").unwrap();

    let err = rollback(&mut conn, dir.path(), WEBSITE, "staging").unwrap_err();

    assert_eq!(err.kind(), SiteErrorKind::NoPreviousRelease);
}

#[test]
fn test_rollback_target_directory_missing() {
    // Given: The healthy predecessor's directory was deleted
    let (dir, mut conn, layout, _) = seeded_history();
    fs::remove_dir_all(layout.release_dir("C")).unwrap();

    // When: A rollback is requested
    let err = rollback(&mut conn, dir.path(), WEBSITE, "staging").unwrap_err();

    // Then: MissingReleaseDir and nothing moved
    assert_eq!(err.kind(), SiteErrorKind::MissingReleaseDir);
    assert_eq!(read_current_release(&layout).unwrap().as_deref(), Some("A"));
    assert_eq!(active_release(&conn).as_deref(), Some("A"));
}

#[test]
fn test_active_release_missing_from_history() {
    let (dir, mut conn, _layout, env_id) = seeded_history();
    SqliteRepo::set_active_release(&conn, env_id, Some("ghost")).unwrap();

    let err = rollback(&mut conn, dir.path(), WEBSITE, "staging").unwrap_err();

    assert_eq!(err.kind(), SiteErrorKind::IntegrityViolation);
}

#[test]
fn test_engine_rollback_after_two_builds() {
    // Given: Two builds of staging
    let mut env = TestEnv::new();
    let first = env.apply_and_build("staging");
    let second = env.engine.build(WEBSITE, "staging").unwrap();

    // When: Rolling back through the engine
    let result = env.engine.rollback(WEBSITE, "staging").unwrap();

    // Then: The first release serves again
    assert_eq!(result.from_release_id, second.release_id);
    assert_eq!(result.to_release_id, first.release_id);
    assert_eq!(
        read_current_release(&env.layout("staging")).unwrap().as_deref(),
        Some(first.release_id.as_str())
    );
    let history = env.engine.releases(WEBSITE, "staging").unwrap();
    assert!(history
        .iter()
        .any(|r| r.id == first.release_id && r.active));
}

#[test]
fn test_failed_activation_commit_restores_pointer() {
    // Given: Two builds of staging, the second serving
    let mut env = TestEnv::new();
    let first = env.apply_and_build("staging");
    let second = env.engine.build(WEBSITE, "staging").unwrap();

    // When: The database refuses to update the environment row
    env.refuse("BEFORE UPDATE ON environments");
    let err = env.engine.rollback(WEBSITE, "staging").unwrap_err();

    // Then: The commit error surfaces and the second release still serves
    assert_eq!(err.kind(), SiteErrorKind::Persistence);
    assert_eq!(
        read_current_release(&env.layout("staging")).unwrap().as_deref(),
        Some(second.release_id.as_str())
    );
    let mut expected = vec![first.release_id.clone(), second.release_id.clone()];
    expected.sort();
    assert_eq!(env.release_dirs("staging"), expected);
    let history = env.engine.releases(WEBSITE, "staging").unwrap();
    assert!(history
        .iter()
        .any(|r| r.id == second.release_id && r.active));
    assert!(history
        .iter()
        .all(|r| r.id == second.release_id || !r.active));
}
