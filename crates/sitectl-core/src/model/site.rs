use crate::model::page::PageDoc;
use crate::model::website::{IconSlot, WebsiteDoc};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Component HTML fragment
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub scope: String,
    pub html: String,
}

/// The two canonical stylesheets of the active style bundle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleSet {
    pub tokens_css: String,
    pub default_css: String,
}

/// A loaded source tree, ready for metadata inspection and rendering
#[derive(Debug, Clone)]
pub struct Site {
    pub root_dir: PathBuf,
    pub website: WebsiteDoc,
    /// Keyed by page name
    pub pages: BTreeMap<String, PageDoc>,
    pub components: BTreeMap<String, Component>,
    pub styles: StyleSet,
    /// Site-relative path of the site script, when one exists
    pub script_path: Option<String>,
    /// Site-relative asset paths
    pub assets: Vec<String>,
    /// Site-relative icon paths per slot
    pub icons: BTreeMap<IconSlot, String>,
}

impl Site {
    /// Name shown on social cards: the website's metadata name
    pub fn site_name(&self) -> &str {
        &self.website.metadata.name
    }

    /// Pages ordered by normalized route
    pub fn pages_by_route(&self) -> Vec<(&String, &PageDoc)> {
        let mut pages: Vec<_> = self.pages.iter().collect();
        pages.sort_by(|a, b| {
            crate::names::normalize_route(&a.1.spec.route)
                .cmp(&crate::names::normalize_route(&b.1.spec.route))
        });
        pages
    }
}
