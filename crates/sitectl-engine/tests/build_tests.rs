// Integration tests for release builds
// Covers the end-to-end layout, output hashing, image caching, og injection and failure audit

mod common;

use common::{
    sample_bundle, sample_bundle_with_canonical, BundleBuilder, CountingImages, FailingRenderer,
    TestEnv, LOGO_PNG, TOKENS_CSS, WEBSITE, WEBSITE_YAML,
};
use sitectl_core::errors::SiteErrorKind;
use sitectl_core::logging_facility::test_capture::init_test_capture;
use sitectl_engine::release::outputs::{
    compute_output_hashes, OutputHashes, BUILD_LOG_FILE, MANIFEST_FILE, OUTPUT_HASHES_FILE,
};
use sitectl_engine::release::pointer::{read_current_release, read_current_target};
use sitectl_engine::SiteToolchain;
use sitectl_store::repo::ReleaseStatus;
use sitectl_store::SqliteRepo;
use std::fs;
use std::sync::Arc;

#[test]
fn test_apply_then_build_produces_release_and_pointer() {
    // Given: The sample website applied to staging
    let mut env = TestEnv::new();

    // When: Staging is built
    let result = env.apply_and_build("staging");

    // Then: The release tree has pages, styles and assets
    let dir = &result.release_dir;
    assert!(fs::read_to_string(dir.join("index.html")).unwrap().contains("Hello"));
    assert_eq!(fs::read_to_string(dir.join("styles/tokens.css")).unwrap(), TOKENS_CSS);
    assert!(dir.join("styles/default.css").is_file());
    assert_eq!(fs::read(dir.join("assets/logo.png")).unwrap(), LOGO_PNG);

    // And: current points at the new release, which is active in the database
    let layout = env.layout("staging");
    assert_eq!(
        read_current_target(&layout).unwrap().as_deref(),
        Some(format!("releases/{}", result.release_id).as_str())
    );
    let history = env.engine.releases(WEBSITE, "staging").unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].active);
    assert_eq!(history[0].status, ReleaseStatus::Active);
    assert_eq!(result.previous_release_id, None);

    // And: No scratch is left behind
    assert_eq!(fs::read_dir(layout.build_root()).unwrap().count(), 0);
    assert!(!layout.tmp_release_dir(&result.release_id).exists());
}

#[test]
fn test_manifest_and_build_log_are_recorded() {
    let mut env = TestEnv::new();

    let result = env.apply_and_build("staging");

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(result.release_dir.join(MANIFEST_FILE)).unwrap())
            .unwrap();
    assert_eq!(manifest["releaseId"], result.release_id.as_str());
    assert_eq!(manifest["website"], WEBSITE);
    assert_eq!(manifest["environment"], "staging");
    assert_eq!(manifest["pages"][0]["name"], "home");
    assert!(result.build_log.contains(&format!(
        "starting release build website=sample env=staging release={}",
        result.release_id
    )));
    assert!(result.build_log.contains("switching current symlink"));
    assert!(result.build_log.contains("release build completed"));
    // No image generator configured
    assert!(result
        .build_log
        .contains("warning: og image generation failed page=home"));
}

#[test]
fn test_build_log_on_disk_is_complete() {
    // Given: A successful build
    let mut env = TestEnv::new();
    let result = env.apply_and_build("staging");

    // When: The log inside the release directory is read back
    let on_disk = fs::read_to_string(result.release_dir.join(BUILD_LOG_FILE)).unwrap();

    // Then: It carries the final lines and matches the stored row
    assert_eq!(on_disk, result.build_log);
    assert!(on_disk.contains("switching current symlink"));
    assert!(on_disk.trim_end().ends_with("release build completed"));
    let row = SqliteRepo::get_release(env.engine.connection(), &result.release_id)
        .unwrap()
        .unwrap();
    assert_eq!(row.build_log, on_disk);
}

#[test]
fn test_output_hash_file_matches_tree_on_disk() {
    // Given: A finished release
    let mut env = TestEnv::new();
    let result = env.apply_and_build("staging");

    // When: The tree is re-hashed
    let on_disk = compute_output_hashes(&result.release_dir).unwrap();
    let recorded: OutputHashes = serde_json::from_str(
        &fs::read_to_string(result.release_dir.join(OUTPUT_HASHES_FILE)).unwrap(),
    )
    .unwrap();

    // Then: File, result and release row agree, and metadata files are excluded
    assert_eq!(recorded, on_disk);
    assert_eq!(result.output_hashes, on_disk);
    let row = SqliteRepo::get_release(env.engine.connection(), &result.release_id)
        .unwrap()
        .unwrap();
    assert_eq!(row.output_hashes().unwrap(), on_disk);
    assert!(!on_disk.contains_key(MANIFEST_FILE));
    assert!(on_disk.contains_key("index.html"));
}

#[test]
fn test_rebuild_of_unchanged_state_is_identical_and_reuses_images() {
    // Given: An engine with a counting image generator
    let images = Arc::new(CountingImages::default());
    let mut env = TestEnv::with_images(images.clone());

    // When: Staging is built twice without changes
    let first = env.apply_and_build("staging");
    let second = env.engine.build(WEBSITE, "staging").unwrap();

    // Then: Output hashes match, the image was generated once
    assert_ne!(first.release_id, second.release_id);
    assert_eq!(first.output_hashes, second.output_hashes);
    assert!(first.output_hashes.contains_key("og/home.png"));
    assert_eq!(images.calls(), 1);
    assert_eq!(second.previous_release_id.as_deref(), Some(first.release_id.as_str()));
    assert_eq!(
        read_current_release(&env.layout("staging")).unwrap().as_deref(),
        Some(second.release_id.as_str())
    );
}

#[test]
fn test_og_image_injected_for_public_canonical() {
    let images = Arc::new(CountingImages::default());
    let mut env = TestEnv::with_images(images);
    env.engine
        .apply(
            WEBSITE,
            "staging",
            &sample_bundle_with_canonical(Some("https://example.com/")).build(),
            false,
        )
        .unwrap();

    let result = env.engine.build(WEBSITE, "staging").unwrap();

    let html = fs::read_to_string(result.release_dir.join("index.html")).unwrap();
    assert!(html.contains("<meta property=\"og:image\" content=\"https://example.com/og/home.png\">"));
    assert!(html.contains("https://example.com/og/home.png"));
    assert!(result.release_dir.join("og/home.png").is_file());
}

#[test]
fn test_loopback_canonical_warns_and_skips_injection() {
    let images = Arc::new(CountingImages::default());
    let mut env = TestEnv::with_images(images);
    env.engine
        .apply(
            WEBSITE,
            "staging",
            &sample_bundle_with_canonical(Some("http://localhost:8080/")).build(),
            false,
        )
        .unwrap();

    let result = env.engine.build(WEBSITE, "staging").unwrap();

    let html = fs::read_to_string(result.release_dir.join("index.html")).unwrap();
    assert!(!html.contains("og:image"));
    assert!(result.build_log.contains("contains local host URL"));
}

#[test]
fn test_renderer_failure_leaves_failed_row_and_no_release() {
    // Given: An engine whose renderer always fails
    let toolchain = SiteToolchain::default().with_renderer(Arc::new(FailingRenderer));
    let mut env = TestEnv::with_toolchain(toolchain);
    env.engine
        .apply(WEBSITE, "staging", &sample_bundle().build(), false)
        .unwrap();

    // When: A build is attempted
    let err = env.engine.build(WEBSITE, "staging").unwrap_err();

    // Then: The error surfaces, a failed row records the attempt
    assert_eq!(err.kind(), SiteErrorKind::ExternalService);
    let history = env.engine.releases(WEBSITE, "staging").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ReleaseStatus::Failed);
    assert!(!history[0].active);
    let row = SqliteRepo::get_release(env.engine.connection(), &history[0].id)
        .unwrap()
        .unwrap();
    assert!(row.build_log.contains("release build failed:"));
    assert!(row.manifest_json.contains("\"releaseId\""));

    // And: Nothing was left on disk
    let layout = env.layout("staging");
    assert_eq!(read_current_target(&layout).unwrap(), None);
    assert_eq!(fs::read_dir(layout.releases_root()).unwrap().count(), 0);
    assert_eq!(fs::read_dir(layout.build_root()).unwrap().count(), 0);
}

#[test]
fn test_failed_build_keeps_previous_release_serving() {
    // Given: A good release
    let mut env = TestEnv::new();
    let good = env.apply_and_build("staging");

    // When: The default style bundle is removed and a build is attempted
    env.engine
        .apply(
            WEBSITE,
            "staging",
            &BundleBuilder::partial().delete("StyleBundle", "default").build(),
            false,
        )
        .unwrap();
    let err = env.engine.build(WEBSITE, "staging").unwrap_err();

    // Then: The build is rejected and the old release still serves
    assert!(err.is_bad_request());
    assert_eq!(
        read_current_release(&env.layout("staging")).unwrap().as_deref(),
        Some(good.release_id.as_str())
    );
    let history = env.engine.releases(WEBSITE, "staging").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history.iter().filter(|r| r.active).count(), 1);
    assert!(history.iter().any(|r| r.status == ReleaseStatus::Failed));
}

#[test]
fn test_website_without_pages_cannot_build() {
    let mut env = TestEnv::new();
    env.engine
        .apply(
            WEBSITE,
            "staging",
            &BundleBuilder::full()
                .website(WEBSITE_YAML)
                .style_bundle("default", TOKENS_CSS, "")
                .build(),
            false,
        )
        .unwrap();

    let err = env.engine.build(WEBSITE, "staging").unwrap_err();

    assert_eq!(err.kind(), SiteErrorKind::InvalidInput);
    let history = env.engine.releases(WEBSITE, "staging").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ReleaseStatus::Failed);
}

#[test]
fn test_unknown_environment_is_not_found() {
    let mut env = TestEnv::new();
    env.engine
        .apply(WEBSITE, "staging", &sample_bundle().build(), false)
        .unwrap();

    let err = env.engine.build(WEBSITE, "production").unwrap_err();

    assert_eq!(err.kind(), SiteErrorKind::NotFound);
}

#[test]
fn test_build_logs_release_id_on_end() {
    let capture = init_test_capture();
    let mut env = TestEnv::new();

    let result = env.apply_and_build("build-logging");

    let ends: Vec<_> = capture
        .find("build", "end")
        .into_iter()
        .filter(|e| e.field("environment") == Some("build-logging"))
        .collect();
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].field("release_id"), Some(result.release_id.as_str()));
}

#[test]
fn test_failed_activation_commit_restores_pointer_and_removes_release() {
    // Given: A good release serving staging
    let mut env = TestEnv::new();
    let good = env.apply_and_build("staging");

    // When: The database refuses the next active release row
    env.refuse("BEFORE INSERT ON releases WHEN NEW.status = 'active'");
    let err = env.engine.build(WEBSITE, "staging").unwrap_err();

    // Then: The commit error surfaces and the good release still serves
    assert_eq!(err.kind(), SiteErrorKind::Persistence);
    let layout = env.layout("staging");
    assert_eq!(
        read_current_release(&layout).unwrap().as_deref(),
        Some(good.release_id.as_str())
    );
    assert_eq!(env.release_dirs("staging"), vec![good.release_id.clone()]);
    assert_eq!(fs::read_dir(layout.build_root()).unwrap().count(), 0);

    // And: The attempt is recorded as failed next to the active release
    let history = env.engine.releases(WEBSITE, "staging").unwrap();
    assert_eq!(history.len(), 2);
    let failed = history
        .iter()
        .find(|r| r.status == ReleaseStatus::Failed)
        .unwrap();
    assert!(!failed.active);
    assert!(history
        .iter()
        .any(|r| r.id == good.release_id && r.active));
}
