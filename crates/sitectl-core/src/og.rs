//! Social preview cards
//!
//! The release builder asks an [`ImageGenerator`] for one PNG per page and
//! stores the result in the blob store under [`cache_key`], so unchanged
//! cards are never generated twice.

use crate::digest::sha256_hex;
use crate::errors::{Result, SiteError, SiteErrorKind};
use regex::Regex;
use std::sync::OnceLock;

pub const DEFAULT_ACCENT_COLOR: &str = "#2563eb";

const CACHE_KEY_VERSION: &str = "og-v1:";

/// Inputs that fully determine a generated card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub title: String,
    pub description: String,
    pub site_name: String,
    pub accent_color: String,
}

/// Deterministic blob key (bare hex) for a card
pub fn cache_key(card: &Card) -> String {
    let material = format!(
        "{}{}\0{}\0{}\0{}",
        CACHE_KEY_VERSION, card.title, card.description, card.site_name, card.accent_color
    );
    sha256_hex(material.as_bytes())
}

/// `--og-accent: #rrggbb` from a tokens stylesheet
pub fn accent_color_from_tokens(tokens_css: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"--og-accent\s*:\s*(#[0-9a-fA-F]{3,8})\b").expect("static regex")
    });
    pattern
        .captures(tokens_css)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Renders a card to PNG bytes
pub trait ImageGenerator: Send + Sync {
    fn generate(&self, card: &Card) -> Result<Vec<u8>>;
}

/// Generator used when no rasterizer is configured. Every call fails, so
/// builds log a warning and ship pages without preview images.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledImageGenerator;

impl ImageGenerator for DisabledImageGenerator {
    fn generate(&self, card: &Card) -> Result<Vec<u8>> {
        Err(SiteError::new(SiteErrorKind::ExternalService)
            .with_op("og_generate")
            .with_message(format!(
                "image generation is disabled (card {:?})",
                card.title
            )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> Card {
        Card {
            title: "Home".into(),
            description: "Welcome".into(),
            site_name: "sample".into(),
            accent_color: DEFAULT_ACCENT_COLOR.into(),
        }
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        assert_eq!(cache_key(&card()), cache_key(&card()));
        assert_eq!(cache_key(&card()).len(), 64);
    }

    #[test]
    fn test_cache_key_depends_on_every_field() {
        let base = cache_key(&card());
        let mut c = card();
        c.accent_color = "#ff0000".into();
        assert_ne!(cache_key(&c), base);

        // field boundaries are delimited, so shifting text between fields changes the key
        let a = Card {
            title: "ab".into(),
            description: "c".into(),
            ..card()
        };
        let b = Card {
            title: "a".into(),
            description: "bc".into(),
            ..card()
        };
        assert_ne!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn test_accent_color_from_tokens() {
        let css = ":root {\n  --brand: #000;\n  --og-accent: #FF8800;\n}";
        assert_eq!(accent_color_from_tokens(css).as_deref(), Some("#ff8800"));
        assert_eq!(accent_color_from_tokens(":root{}"), None);
    }

    #[test]
    fn test_disabled_generator_fails_as_external() {
        let err = DisabledImageGenerator.generate(&card()).unwrap_err();
        assert_eq!(err.kind(), SiteErrorKind::ExternalService);
    }
}
