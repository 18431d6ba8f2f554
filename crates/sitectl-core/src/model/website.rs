use crate::errors::ValidationError;
use crate::urls::absolute_http_url;
use serde::{Deserialize, Serialize};

pub const DEFAULT_STYLE_BUNDLE: &str = "default";
pub const DEFAULT_BASE_TEMPLATE: &str = "default";

fn is_empty(s: &str) -> bool {
    s.is_empty()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
}

/// `website.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteDoc {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: WebsiteSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteSpec {
    #[serde(default)]
    pub default_style_bundle: String,
    #[serde(default)]
    pub base_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<WebsiteHead>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo: Option<WebsiteSeo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebsiteHead {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icons: Option<WebsiteIcons>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteIcons {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub svg: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub ico: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub apple_touch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebsiteSeo {
    #[serde(rename = "publicBaseURL", default, skip_serializing_if = "is_empty")]
    pub public_base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robots: Option<WebsiteRobots>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sitemap: Option<SitemapSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebsiteRobots {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<RobotsGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotsGroup {
    #[serde(default)]
    pub user_agents: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disallow: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SitemapSettings {
    #[serde(default)]
    pub enabled: bool,
}

/// Website icon slot, the natural key of a website icon row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IconSlot {
    Svg,
    Ico,
    AppleTouch,
}

impl IconSlot {
    pub const ALL: [IconSlot; 3] = [IconSlot::Svg, IconSlot::Ico, IconSlot::AppleTouch];

    /// Stored slot value
    pub fn as_str(&self) -> &'static str {
        match self {
            IconSlot::Svg => "svg",
            IconSlot::Ico => "ico",
            IconSlot::AppleTouch => "apple_touch",
        }
    }

    /// Resource name used for this slot in bundles
    pub fn resource_name(&self) -> &'static str {
        match self {
            IconSlot::Svg => "website-icon-svg",
            IconSlot::Ico => "website-icon-ico",
            IconSlot::AppleTouch => "website-icon-apple-touch",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    pub fn from_resource_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.resource_name() == name)
    }

    /// Field name under `head.icons` that references this slot
    pub fn head_field(&self) -> &'static str {
        match self {
            IconSlot::Svg => "svg",
            IconSlot::Ico => "ico",
            IconSlot::AppleTouch => "appleTouch",
        }
    }
}

impl WebsiteIcons {
    pub fn get(&self, slot: IconSlot) -> &str {
        match slot {
            IconSlot::Svg => &self.svg,
            IconSlot::Ico => &self.ico,
            IconSlot::AppleTouch => &self.apple_touch,
        }
    }

    /// Declared `(slot, path)` pairs, skipping empty slots
    pub fn declared(&self) -> Vec<(IconSlot, &str)> {
        IconSlot::ALL
            .into_iter()
            .map(|slot| (slot, self.get(slot).trim()))
            .filter(|(_, path)| !path.is_empty())
            .collect()
    }
}

impl WebsiteSeo {
    /// Trim and check `publicBaseURL`; a set value must be absolute http(s).
    pub fn normalize(&mut self) -> Result<(), ValidationError> {
        let trimmed = self.public_base_url.trim().trim_end_matches('/').to_string();
        if !trimmed.is_empty() && absolute_http_url(&trimmed).is_none() {
            return Err(ValidationError::InvalidDocument {
                document: "website.yaml".to_string(),
                reason: format!(
                    "seo.publicBaseURL {:?} must be an absolute http(s) URL",
                    self.public_base_url
                ),
            });
        }
        self.public_base_url = trimmed;
        Ok(())
    }

    pub fn sitemap_enabled(&self) -> bool {
        self.sitemap.as_ref().is_some_and(|s| s.enabled) && !self.public_base_url.is_empty()
    }

    pub fn robots_enabled(&self) -> bool {
        self.robots.as_ref().is_some_and(|r| r.enabled)
    }
}

impl WebsiteDoc {
    pub fn from_yaml(bytes: &[u8]) -> Result<Self, ValidationError> {
        serde_yaml::from_slice(bytes).map_err(|e| ValidationError::InvalidDocument {
            document: "website.yaml".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Style bundle name, falling back to the default bundle
    pub fn style_bundle(&self) -> &str {
        match self.spec.default_style_bundle.trim() {
            "" => DEFAULT_STYLE_BUNDLE,
            name => name,
        }
    }

    pub fn icons(&self) -> Option<&WebsiteIcons> {
        self.spec.head.as_ref().and_then(|h| h.icons.as_ref())
    }
}
