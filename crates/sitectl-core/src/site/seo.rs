//! `sitemap.xml` and `robots.txt` generation

use super::escape_markup;
use crate::model::{RobotsGroup, Site, WebsiteRobots};
use crate::urls::absolute_http_url;
use url::Url;

pub const SITEMAP_FILE: &str = "sitemap.xml";
pub const ROBOTS_FILE: &str = "robots.txt";

/// Generated SEO files plus any warnings for the build log
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SeoFiles {
    pub sitemap: Option<String>,
    pub robots: Option<String>,
    pub warnings: Vec<String>,
}

fn base_path(base: &Url) -> String {
    base.path().trim_end_matches('/').to_string()
}

fn within_scope(base: &Url, candidate: &Url) -> bool {
    if base.origin() != candidate.origin() {
        return false;
    }
    let base_path = base_path(base);
    if base_path.is_empty() {
        return true;
    }
    let path = candidate.path().trim_end_matches('/');
    path == base_path || path.starts_with(&format!("{}/", base_path))
}

fn derived_location(base: &Url, route: &str) -> String {
    let mut url = base.clone();
    let prefix = base_path(base);
    if route == "/" {
        url.set_path(&format!("{}/", prefix));
    } else {
        url.set_path(&format!("{}{}", prefix, route));
    }
    url.to_string()
}

/// Sitemap location for one page, or a warning when its canonical URL
/// points outside the public base URL.
fn page_location(base: &Url, page_name: &str, route: &str, canonical: &str) -> Result<String, String> {
    let canonical = canonical.trim();
    if canonical.is_empty() {
        return Ok(derived_location(base, route));
    }
    let resolved = if canonical.starts_with('/') {
        base.join(canonical).ok()
    } else {
        absolute_http_url(canonical)
    };
    match resolved {
        Some(url) if within_scope(base, &url) => Ok(url.to_string()),
        Some(_) => Err(format!(
            "warning: page={} skipped from sitemap because canonicalURL {:?} does not match publicBaseURL {:?}",
            page_name,
            canonical,
            base.as_str()
        )),
        None => Ok(derived_location(base, route)),
    }
}

fn sitemap_xml(base: &Url, site: &Site, warnings: &mut Vec<String>) -> String {
    let mut locations: Vec<String> = Vec::new();
    for (name, page) in &site.pages {
        let head = page.spec.head.as_ref();
        if head.is_some_and(|h| h.is_noindex()) {
            continue;
        }
        let canonical = head.map(|h| h.canonical_url.as_str()).unwrap_or("");
        match page_location(base, name, &page.spec.route, canonical) {
            Ok(loc) => locations.push(loc),
            Err(warning) => warnings.push(warning),
        }
    }
    locations.sort();

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
    for loc in locations {
        xml.push_str("  <url>\n    <loc>");
        xml.push_str(&escape_markup(&loc));
        xml.push_str("</loc>\n  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

/// `robots.txt` body; the default group allows everything
pub fn robots_txt(robots: &WebsiteRobots, sitemap_url: Option<&str>) -> String {
    let default_group = [RobotsGroup {
        user_agents: vec!["*".to_string()],
        allow: vec!["/".to_string()],
        disallow: vec![],
    }];
    let groups: &[RobotsGroup] = if robots.groups.is_empty() {
        &default_group
    } else {
        &robots.groups
    };

    let mut lines: Vec<String> = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.extend(group.user_agents.iter().map(|ua| format!("User-agent: {}", ua)));
        lines.extend(group.allow.iter().map(|p| format!("Allow: {}", p)));
        lines.extend(group.disallow.iter().map(|p| format!("Disallow: {}", p)));
    }
    if let Some(url) = sitemap_url.filter(|u| !u.trim().is_empty()) {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(format!("Sitemap: {}", url));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Generate whichever SEO files the website enables
pub fn generate(site: &Site) -> SeoFiles {
    let mut files = SeoFiles::default();
    let Some(seo) = site.website.spec.seo.as_ref() else {
        return files;
    };

    let base = absolute_http_url(&seo.public_base_url);
    let mut sitemap_url = None;
    if seo.sitemap.as_ref().is_some_and(|s| s.enabled) {
        match &base {
            Some(base) => {
                files.sitemap = Some(sitemap_xml(base, site, &mut files.warnings));
                sitemap_url = Some(format!("{}/{}", base.as_str().trim_end_matches('/'), SITEMAP_FILE));
            }
            None => files.warnings.push(
                "warning: sitemap enabled but seo.publicBaseURL is not an absolute http(s) URL; sitemap.xml not generated"
                    .to_string(),
            ),
        }
    }
    if let Some(robots) = seo.robots.as_ref().filter(|r| r.enabled) {
        files.robots = Some(robots_txt(robots, sitemap_url.as_deref()));
    }
    files
}
