use super::{
    SiteLoader, COMPONENTS_DIR, COMPONENT_SCOPE_GLOBAL, COMPONENT_SUFFIX, DEFAULT_CSS, PAGES_DIR,
    PAGE_SUFFIX, SCRIPT_PATH, STYLES_DIR, TOKENS_CSS, WEBSITE_FILE,
};
use crate::errors::{Result, SiteError, SiteErrorKind};
use crate::model::{Component, PageDoc, Site, StyleSet, WebsiteDoc};
use crate::names::{normalize_route, validate_name};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Loads the source layout written by the release builder
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSiteLoader;

fn read_text(root: &Path, rel: &str) -> Result<String> {
    let path = root.join(rel);
    fs::read_to_string(&path).map_err(|e| {
        SiteError::from(e)
            .with_op("load_site")
            .with_path(path.display().to_string())
    })
}

fn invalid(message: impl Into<String>) -> SiteError {
    SiteError::new(SiteErrorKind::InvalidInput)
        .with_op("load_site")
        .with_message(message)
}

/// `(name, contents)` for every file in `dir` ending in `suffix`, sorted by name
fn read_named_files(dir: &Path, suffix: &str) -> Result<Vec<(String, Vec<u8>)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(name) = file_name.strip_suffix(suffix) else {
            continue;
        };
        if !entry.file_type()?.is_file() {
            continue;
        }
        out.push((name.to_string(), fs::read(entry.path())?));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

fn is_source_file(rel: &str) -> bool {
    rel == WEBSITE_FILE
        || rel == SCRIPT_PATH
        || rel.starts_with(&format!("{}/", COMPONENTS_DIR))
        || rel.starts_with(&format!("{}/", PAGES_DIR))
        || rel.starts_with(&format!("{}/", STYLES_DIR))
}

impl FsSiteLoader {
    fn load_pages(&self, root: &Path) -> Result<BTreeMap<String, PageDoc>> {
        let mut pages = BTreeMap::new();
        for (name, bytes) in read_named_files(&root.join(PAGES_DIR), PAGE_SUFFIX)? {
            validate_name("page name", &name)?;
            let mut page = PageDoc::from_yaml(&format!("{}{}", name, PAGE_SUFFIX), &bytes)?;
            if page.metadata.name.is_empty() {
                page.metadata.name = name.clone();
            } else if page.metadata.name != name {
                return Err(invalid(format!(
                    "page file {}{} declares metadata.name {:?}",
                    name, PAGE_SUFFIX, page.metadata.name
                )));
            }
            page.spec.route = normalize_route(&page.spec.route);
            pages.insert(name, page);
        }
        Ok(pages)
    }

    fn load_components(&self, root: &Path) -> Result<BTreeMap<String, Component>> {
        let mut components = BTreeMap::new();
        for (name, bytes) in read_named_files(&root.join(COMPONENTS_DIR), COMPONENT_SUFFIX)? {
            validate_name("component name", &name)?;
            let html = String::from_utf8(bytes)
                .map_err(|_| invalid(format!("component {} is not valid UTF-8", name)))?;
            components.insert(
                name.clone(),
                Component {
                    name,
                    scope: COMPONENT_SCOPE_GLOBAL.to_string(),
                    html,
                },
            );
        }
        Ok(components)
    }

    fn validate(
        &self,
        pages: &BTreeMap<String, PageDoc>,
        components: &BTreeMap<String, Component>,
    ) -> Result<()> {
        if pages.is_empty() {
            return Err(invalid("site has no pages"));
        }
        let mut routes: HashMap<&str, &str> = HashMap::new();
        for (name, page) in pages {
            if let Some(other) = routes.insert(page.spec.route.as_str(), name.as_str()) {
                return Err(invalid(format!(
                    "pages {} and {} share route {}",
                    other, name, page.spec.route
                )));
            }
            for include in page.includes() {
                if !components.contains_key(&include) {
                    return Err(invalid(format!(
                        "page {} includes unknown component {:?}",
                        name, include
                    )));
                }
            }
        }
        Ok(())
    }
}

impl SiteLoader for FsSiteLoader {
    fn load(&self, source_dir: &Path) -> Result<Site> {
        let website = WebsiteDoc::from_yaml(read_text(source_dir, WEBSITE_FILE)?.as_bytes())?;
        let pages = self.load_pages(source_dir)?;
        let components = self.load_components(source_dir)?;
        self.validate(&pages, &components)?;

        let styles = StyleSet {
            tokens_css: read_text(source_dir, TOKENS_CSS)?,
            default_css: read_text(source_dir, DEFAULT_CSS)?,
        };
        let script_path = source_dir
            .join(SCRIPT_PATH)
            .is_file()
            .then(|| SCRIPT_PATH.to_string());

        let mut icons = BTreeMap::new();
        if let Some(declared) = website.icons() {
            for (slot, path) in declared.declared() {
                if source_dir.join(path).is_file() {
                    icons.insert(slot, path.to_string());
                }
            }
        }

        let mut assets = Vec::new();
        for entry in WalkDir::new(source_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| invalid(format!("walk source tree: {}", e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(source_dir)
                .map_err(|e| SiteError::internal(e.to_string()))?
                .to_string_lossy()
                .replace('\\', "/");
            if !is_source_file(&rel) && !icons.values().any(|p| p == &rel) {
                assets.push(rel);
            }
        }

        Ok(Site {
            root_dir: source_dir.to_path_buf(),
            website,
            pages,
            components,
            styles,
            script_path,
            assets,
            icons,
        })
    }
}
