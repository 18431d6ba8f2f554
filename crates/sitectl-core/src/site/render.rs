use super::{escape_markup, Renderer, DEFAULT_CSS, TOKENS_CSS};
use crate::errors::{Result, SiteError, SiteErrorKind};
use crate::model::{IconSlot, PageDoc, PageHead, Site};
use crate::names::sanitize_rel_path;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Minimal static renderer: one `index.html` per page route, composed from
/// the page's layout components, with head metadata rendered as tags.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer;

fn output_path(out_dir: &Path, route: &str) -> Result<PathBuf> {
    let trimmed = route.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(out_dir.join("index.html"));
    }
    let rel = sanitize_rel_path(trimmed)?;
    Ok(out_dir.join(rel).join("index.html"))
}

fn meta_name(out: &mut String, name: &str, content: &str) {
    if !content.is_empty() {
        let _ = writeln!(
            out,
            "  <meta name=\"{}\" content=\"{}\">",
            escape_markup(name),
            escape_markup(content)
        );
    }
}

fn meta_property(out: &mut String, property: &str, content: &str) {
    if !content.is_empty() {
        let _ = writeln!(
            out,
            "  <meta property=\"{}\" content=\"{}\">",
            property,
            escape_markup(content)
        );
    }
}

fn render_head_metadata(out: &mut String, head: &PageHead) -> Result<()> {
    if !head.canonical_url.is_empty() {
        let _ = writeln!(
            out,
            "  <link rel=\"canonical\" href=\"{}\">",
            escape_markup(&head.canonical_url)
        );
    }
    for (name, content) in &head.meta {
        meta_name(out, name, content);
    }
    if let Some(og) = &head.open_graph {
        meta_property(out, "og:type", &og.og_type);
        meta_property(out, "og:url", &og.url);
        meta_property(out, "og:site_name", &og.site_name);
        meta_property(out, "og:locale", &og.locale);
        meta_property(out, "og:title", &og.title);
        meta_property(out, "og:description", &og.description);
        meta_property(out, "og:image", &og.image);
    }
    if let Some(tw) = &head.twitter {
        meta_name(out, "twitter:card", &tw.card);
        meta_name(out, "twitter:url", &tw.url);
        meta_name(out, "twitter:title", &tw.title);
        meta_name(out, "twitter:description", &tw.description);
        meta_name(out, "twitter:image", &tw.image);
    }
    for block in &head.json_ld {
        let json = serde_json::to_string(&block.payload)?;
        let _ = writeln!(
            out,
            "  <script type=\"application/ld+json\">{}</script>",
            json.replace("</", "<\\/")
        );
    }
    Ok(())
}

fn render_icons(out: &mut String, site: &Site) {
    for (slot, path) in &site.icons {
        let href = escape_markup(path);
        let _ = match slot {
            IconSlot::Svg => writeln!(
                out,
                "  <link rel=\"icon\" type=\"image/svg+xml\" href=\"/{}\">",
                href
            ),
            IconSlot::Ico => writeln!(out, "  <link rel=\"icon\" href=\"/{}\" sizes=\"any\">", href),
            IconSlot::AppleTouch => {
                writeln!(out, "  <link rel=\"apple-touch-icon\" href=\"/{}\">", href)
            }
        };
    }
}

impl HtmlRenderer {
    fn render_page(&self, site: &Site, name: &str, page: &PageDoc) -> Result<String> {
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        out.push_str("  <meta charset=\"utf-8\">\n");
        out.push_str("  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
        let _ = writeln!(out, "  <title>{}</title>", escape_markup(&page.spec.title));
        meta_name(&mut out, "description", &page.spec.description);
        if let Some(head) = &page.spec.head {
            render_head_metadata(&mut out, head)?;
        }
        render_icons(&mut out, site);
        let _ = writeln!(out, "  <link rel=\"stylesheet\" href=\"/{}\">", TOKENS_CSS);
        let _ = writeln!(out, "  <link rel=\"stylesheet\" href=\"/{}\">", DEFAULT_CSS);
        out.push_str("</head>\n<body>\n");

        for include in page.includes() {
            let component = site.components.get(&include).ok_or_else(|| {
                SiteError::new(SiteErrorKind::InvalidInput)
                    .with_op("render")
                    .with_message(format!("page {} includes unknown component {}", name, include))
            })?;
            out.push_str(component.html.trim_end());
            out.push('\n');
        }

        if let Some(script) = &site.script_path {
            let _ = writeln!(out, "<script src=\"/{}\" defer></script>", escape_markup(script));
        }
        out.push_str("</body>\n</html>\n");
        Ok(out)
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, site: &Site, out_dir: &Path) -> Result<()> {
        fs::create_dir_all(out_dir)?;
        for (name, page) in site.pages_by_route() {
            let html = self.render_page(site, name, page)?;
            let path = output_path(out_dir, &page.spec.route)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, html).map_err(|e| {
                SiteError::from(e)
                    .with_op("render")
                    .with_path(path.display().to_string())
            })?;
        }
        Ok(())
    }
}
