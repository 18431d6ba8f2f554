//! Site loading and rendering collaborators
//!
//! The release builder materializes desired state into a source tree with
//! the layout described by the constants below, hands it to a
//! [`SiteLoader`], and renders the resulting [`Site`] with a [`Renderer`].
//! Both are traits so deployments can swap in their own toolchain;
//! [`FsSiteLoader`] and [`HtmlRenderer`] are the bundled implementations.

mod loader;
mod render;
pub mod seo;

pub use loader::FsSiteLoader;
pub use render::HtmlRenderer;

use crate::errors::Result;
use crate::model::Site;
use std::path::Path;

pub const WEBSITE_FILE: &str = "website.yaml";
pub const COMPONENTS_DIR: &str = "components";
pub const COMPONENT_SUFFIX: &str = ".html";
pub const PAGES_DIR: &str = "pages";
pub const PAGE_SUFFIX: &str = ".page.yaml";
pub const STYLES_DIR: &str = "styles";
pub const TOKENS_CSS: &str = "styles/tokens.css";
pub const DEFAULT_CSS: &str = "styles/default.css";
pub const SCRIPT_PATH: &str = "scripts/site.js";
pub const COMPONENT_SCOPE_GLOBAL: &str = "global";

/// Turns a materialized source tree back into a structured site model
pub trait SiteLoader: Send + Sync {
    fn load(&self, source_dir: &Path) -> Result<Site>;
}

/// Writes the static HTML for a site into `out_dir`
pub trait Renderer: Send + Sync {
    fn render(&self, site: &Site, out_dir: &Path) -> Result<()>;
}

/// Escape text for HTML/XML element content and quoted attributes
pub fn escape_markup(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
