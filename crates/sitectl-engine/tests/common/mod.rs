// Shared fixtures for engine integration tests
// Bundle builders, an engine over a temp data dir, and counting collaborators

#![allow(dead_code)]

use sitectl_core::bundle::{ApplyMode, Bundle, FileDescriptor, Manifest, ResourceDescriptor};
use sitectl_core::digest::content_hash;
use sitectl_core::errors::{Result, SiteError, SiteErrorKind};
use sitectl_core::model::Site;
use sitectl_core::og::{Card, ImageGenerator};
use sitectl_core::site::{HtmlRenderer, Renderer};
use sitectl_engine::release::EnvLayout;
use sitectl_engine::{ReleaseEngine, SiteToolchain};
use sitectl_store::db::open_and_migrate;
use sitectl_store::BlobStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const WEBSITE: &str = "sample";

pub const WEBSITE_YAML: &str = "apiVersion: site/v1
kind: Website
metadata:
  name: sample
spec:
  defaultStyleBundle: default
";

pub const TOKENS_CSS: &str = ":root { --og-accent: #0f766e; --space: 4px; }\n";
pub const DEFAULT_CSS: &str = "body { margin: 0; }\n";
pub const LOGO_PNG: &[u8] = b"\x89PNG\r\n\x1a\nlogo";

pub fn page_yaml(name: &str, route: &str, title: &str, canonical: Option<&str>) -> String {
    let mut yaml = format!(
        "apiVersion: site/v1\nkind: Page\nmetadata:\n  name: {}\nspec:\n  route: {}\n  title: {}\n  description: {} page\n  layout:\n    - include: hero\n",
        name, route, title, title
    );
    if let Some(url) = canonical {
        yaml.push_str(&format!("  head:\n    canonicalURL: {}\n", url));
    }
    yaml
}

/// Builds bundles with correct declared hashes
pub struct BundleBuilder {
    mode: ApplyMode,
    website: String,
    resources: Vec<ResourceDescriptor>,
    files: BTreeMap<String, Vec<u8>>,
}

impl BundleBuilder {
    pub fn new(mode: ApplyMode) -> Self {
        Self {
            mode,
            website: WEBSITE.to_string(),
            resources: Vec::new(),
            files: BTreeMap::new(),
        }
    }

    pub fn full() -> Self {
        Self::new(ApplyMode::Full)
    }

    pub fn partial() -> Self {
        Self::new(ApplyMode::Partial)
    }

    pub fn single(mut self, kind: &str, name: &str, path: &str, content: &[u8]) -> Self {
        self.resources.push(ResourceDescriptor {
            kind: kind.to_string(),
            name: name.to_string(),
            file: path.to_string(),
            hash: content_hash(content),
            ..Default::default()
        });
        self.files.insert(path.to_string(), content.to_vec());
        self
    }

    pub fn website(self, yaml: &str) -> Self {
        self.single("Website", WEBSITE, "website.yaml", yaml.as_bytes())
    }

    pub fn page(self, name: &str, yaml: &str) -> Self {
        let path = format!("pages/{}.page.yaml", name);
        self.single("Page", name, &path, yaml.as_bytes())
    }

    pub fn component(self, name: &str, html: &str) -> Self {
        let path = format!("components/{}.html", name);
        self.single("Component", name, &path, html.as_bytes())
    }

    pub fn style_bundle(mut self, name: &str, tokens: &str, default: &str) -> Self {
        let files = [("styles/tokens.css", tokens), ("styles/default.css", default)];
        self.resources.push(ResourceDescriptor {
            kind: "StyleBundle".to_string(),
            name: name.to_string(),
            files: files
                .iter()
                .map(|(path, css)| FileDescriptor {
                    file: path.to_string(),
                    hash: content_hash(css.as_bytes()),
                })
                .collect(),
            ..Default::default()
        });
        for (path, css) in files {
            self.files.insert(path.to_string(), css.as_bytes().to_vec());
        }
        self
    }

    pub fn asset(self, path: &str, content: &[u8]) -> Self {
        self.single("Asset", path, path, content)
    }

    pub fn delete(mut self, kind: &str, name: &str) -> Self {
        self.resources.push(ResourceDescriptor {
            kind: kind.to_string(),
            name: name.to_string(),
            deleted: true,
            ..Default::default()
        });
        self
    }

    /// Declare a hash that does not match the file
    pub fn corrupt_hash(mut self, name: &str) -> Self {
        if let Some(r) = self.resources.iter_mut().find(|r| r.name == name) {
            r.hash = content_hash(b"something else");
        }
        self
    }

    pub fn build(self) -> Bundle {
        Bundle::new(
            Manifest {
                api_version: "sitectl/v1".to_string(),
                mode: self.mode,
                website: self.website,
                resources: self.resources,
            },
            self.files,
        )
    }
}

/// `sample`: one home page including `hero`, default styles and a logo
pub fn sample_bundle() -> BundleBuilder {
    sample_bundle_with_canonical(None)
}

pub fn sample_bundle_with_canonical(canonical: Option<&str>) -> BundleBuilder {
    BundleBuilder::full()
        .website(WEBSITE_YAML)
        .page("home", &page_yaml("home", "/", "Home", canonical))
        .component("hero", "<section class=\"hero\">Hello</section>")
        .style_bundle("default", TOKENS_CSS, DEFAULT_CSS)
        .asset("assets/logo.png", LOGO_PNG)
}

/// Image generator that counts calls and returns fixed bytes
#[derive(Default)]
pub struct CountingImages {
    calls: AtomicUsize,
}

impl CountingImages {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageGenerator for CountingImages {
    fn generate(&self, card: &Card) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("PNG:{}", card.title).into_bytes())
    }
}

/// Renderer that fails every call
pub struct FailingRenderer;

impl Renderer for FailingRenderer {
    fn render(&self, _site: &Site, _out_dir: &Path) -> Result<()> {
        Err(SiteError::new(SiteErrorKind::ExternalService)
            .with_op("render")
            .with_message("renderer unavailable"))
    }
}

/// Renderer that delegates to `HtmlRenderer` and counts calls
#[derive(Default)]
pub struct CountingRenderer {
    calls: AtomicUsize,
}

impl CountingRenderer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Renderer for CountingRenderer {
    fn render(&self, site: &Site, out_dir: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        HtmlRenderer.render(site, out_dir)
    }
}

/// Engine over a fresh temp data directory
pub struct TestEnv {
    pub dir: TempDir,
    pub engine: ReleaseEngine,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_toolchain(SiteToolchain::default())
    }

    pub fn with_toolchain(toolchain: SiteToolchain) -> Self {
        let dir = TempDir::new().unwrap();
        let conn = open_and_migrate(dir.path().join("sitectl.db")).unwrap();
        let blobs = BlobStore::new(dir.path().join("blobs"));
        let websites_root = dir.path().join("websites");
        let engine = ReleaseEngine::new(conn, blobs, websites_root, toolchain);
        Self { dir, engine }
    }

    pub fn with_images(images: Arc<CountingImages>) -> Self {
        Self::with_toolchain(SiteToolchain::default().with_images(images))
    }

    pub fn websites_root(&self) -> PathBuf {
        self.engine.websites_root().to_path_buf()
    }

    pub fn layout(&self, environment: &str) -> EnvLayout {
        EnvLayout::new(self.engine.websites_root(), WEBSITE, environment)
    }

    /// Apply the sample bundle to `environment` without building it
    pub fn declare(&mut self, environment: &str) {
        self.engine
            .apply(WEBSITE, environment, &sample_bundle().build(), false)
            .unwrap();
    }

    /// Apply the sample bundle to `environment` and build it
    pub fn apply_and_build(&mut self, environment: &str) -> sitectl_engine::BuildResult {
        self.declare(environment);
        self.engine.build(WEBSITE, environment).unwrap()
    }

    /// Make SQLite abort the next statement matching `event`; used to fail
    /// an activation after the filesystem steps succeeded
    pub fn refuse(&self, event: &str) {
        self.engine
            .connection()
            .execute_batch(&format!(
                "CREATE TRIGGER refuse_activation {} BEGIN SELECT RAISE(ABORT, 'activation refused'); END;",
                event
            ))
            .unwrap();
    }

    /// Names of the finalized release directories of `environment`
    pub fn release_dirs(&self, environment: &str) -> Vec<String> {
        let root = self.layout(environment).releases_root();
        let mut names: Vec<String> = match std::fs::read_dir(&root) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}
