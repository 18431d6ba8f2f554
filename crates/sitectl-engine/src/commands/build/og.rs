//! Social card images and page metadata checks for a build.
//!
//! Image problems never fail a build: each one becomes a build-log warning
//! and the affected page ships without a card.

#![allow(clippy::result_large_err)]

use crate::release::fsutil::{link_or_copy, remove_dir_if_exists};
use crate::release::BuildLog;
use sitectl_core::model::{OpenGraph, PageDoc, PageHead, Site, TwitterCard};
use sitectl_core::og::{accent_color_from_tokens, cache_key, Card, ImageGenerator, DEFAULT_ACCENT_COLOR};
use sitectl_core::urls::{is_loopback_url, og_image_url};
use sitectl_store::BlobStore;
use std::collections::BTreeMap;
use std::path::Path;

pub const OG_DIR: &str = "og";

/// Page name → blob key of its card image
pub type PageImages = BTreeMap<String, String>;

/// Warn about head URLs that point at a loopback host
pub fn warn_local_host_urls(site: &Site, log: &mut BuildLog) {
    for (name, page) in &site.pages {
        let Some(head) = page.spec.head.as_ref() else {
            continue;
        };
        for (field, value) in head.url_fields() {
            if is_loopback_url(value) {
                log.warn(format!(
                    "warning: page={} field={} contains local host URL {:?}; update to production URL before promoting",
                    name, field, value
                ));
            }
        }
    }
}

fn first_non_empty(candidates: &[&str]) -> String {
    candidates
        .iter()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

pub fn card_for_page(site: &Site, page: &PageDoc) -> Card {
    let og = page.spec.head.as_ref().and_then(|h| h.open_graph.as_ref());
    let og_title = og.map(|o| o.title.as_str()).unwrap_or_default();
    let og_description = og.map(|o| o.description.as_str()).unwrap_or_default();
    let og_site_name = og.map(|o| o.site_name.as_str()).unwrap_or_default();
    Card {
        title: first_non_empty(&[og_title, page.spec.title.as_str()]),
        description: first_non_empty(&[og_description, page.spec.description.as_str()]),
        site_name: first_non_empty(&[og_site_name, site.site_name()]),
        accent_color: accent_color_from_tokens(&site.styles.tokens_css)
            .unwrap_or_else(|| DEFAULT_ACCENT_COLOR.to_string()),
    }
}

/// Make sure a card blob exists for every page, generating missing ones
pub fn ensure_images(
    blobs: &BlobStore,
    generator: &dyn ImageGenerator,
    site: &Site,
    log: &mut BuildLog,
) -> PageImages {
    let mut images = PageImages::new();
    for (name, page) in &site.pages {
        let card = card_for_page(site, page);
        let key = cache_key(&card);
        match blobs.exists(&key) {
            Ok(true) => {
                images.insert(name.clone(), key);
                continue;
            }
            Ok(false) => {}
            Err(err) => {
                log.warn(format!(
                    "warning: og image generation failed page={}: stat cache blob: {}",
                    name, err
                ));
                continue;
            }
        }
        let png = match generator.generate(&card) {
            Ok(png) => png,
            Err(err) => {
                log.warn(format!("warning: og image generation failed page={}: {}", name, err));
                continue;
            }
        };
        if let Err(err) = blobs.put(&key, &png) {
            log.warn(format!(
                "warning: og image generation failed page={}: put blob: {}",
                name, err
            ));
            continue;
        }
        images.insert(name.clone(), key);
    }
    images
}

fn place_image(blobs: &BlobStore, key: &str, target: &Path) -> sitectl_core::Result<()> {
    let source = blobs.path(key)?;
    link_or_copy(&source, target)?;
    Ok(())
}

/// Try placing every image into a throwaway directory; only images that
/// place cleanly are kept. The probe directory is removed afterwards.
pub fn preflight(blobs: &BlobStore, images: &PageImages, probe_dir: &Path, log: &mut BuildLog) -> PageImages {
    let mut ready = PageImages::new();
    for (name, key) in images {
        let target = probe_dir.join(OG_DIR).join(format!("{}.png", name));
        match place_image(blobs, key, &target) {
            Ok(()) => {
                ready.insert(name.clone(), key.clone());
            }
            Err(err) => log.warn(format!(
                "warning: og image materialization failed page={}: {}",
                name, err
            )),
        }
    }
    if let Err(err) = remove_dir_if_exists(probe_dir) {
        tracing::warn!(error = %err, "failed to remove og probe directory");
    }
    ready
}

/// Point `openGraph.image` and `twitter.image` at the generated card where
/// the page has a public canonical URL and no explicit image
pub fn inject_metadata(site: &mut Site, ready: &PageImages, log: &mut BuildLog) {
    for name in ready.keys() {
        let Some(page) = site.pages.get_mut(name) else {
            continue;
        };
        let Some(head) = page.spec.head.as_mut() else {
            continue;
        };
        let Some(url) = og_image_url(&head.canonical_url, name) else {
            continue;
        };
        if is_loopback_url(&url) {
            continue;
        }
        inject_into_head(head, name, &url, log);
    }
}

fn inject_into_head(head: &mut PageHead, page: &str, url: &str, log: &mut BuildLog) {
    let og = head.open_graph.get_or_insert_with(OpenGraph::default);
    if og.image.trim().is_empty() {
        og.image = url.to_string();
    } else {
        log.add(format!(
            "info: page={} og card not injected into openGraph.image (already set to {:?})",
            page, og.image
        ));
    }
    let twitter = head.twitter.get_or_insert_with(TwitterCard::default);
    if twitter.image.trim().is_empty() {
        twitter.image = url.to_string();
    } else {
        log.add(format!(
            "info: page={} og card not injected into twitter.image (already set to {:?})",
            page, twitter.image
        ));
    }
}

/// Place ready images at `og/<page>.png` inside the release tree
pub fn materialize_images(blobs: &BlobStore, release_dir: &Path, ready: &PageImages, log: &mut BuildLog) {
    for (name, key) in ready {
        let target = release_dir.join(OG_DIR).join(format!("{}.png", name));
        if let Err(err) = place_image(blobs, key, &target) {
            log.warn(format!(
                "warning: og image materialization failed page={}: {}",
                name, err
            ));
        }
    }
}
