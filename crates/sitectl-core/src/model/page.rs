use crate::errors::ValidationError;
use crate::model::website::Metadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn is_empty(s: &str) -> bool {
    s.is_empty()
}

/// `pages/<name>.page.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDoc {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: PageSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub layout: Vec<LayoutItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<PageHead>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutItem {
    pub include: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageHead {
    #[serde(rename = "canonicalURL", default, skip_serializing_if = "is_empty")]
    pub canonical_url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
    #[serde(rename = "openGraph", default, skip_serializing_if = "Option::is_none")]
    pub open_graph: Option<OpenGraph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<TwitterCard>,
    #[serde(rename = "jsonLD", default, skip_serializing_if = "Vec::is_empty")]
    pub json_ld: Vec<JsonLdBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenGraph {
    #[serde(rename = "type", default, skip_serializing_if = "is_empty")]
    pub og_type: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub site_name: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub locale: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwitterCard {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub card: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonLdBlock {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    #[serde(default)]
    pub payload: BTreeMap<String, serde_json::Value>,
}

impl PageHead {
    /// Canonical JSON stored in the pages table. `{}` for an empty head.
    pub fn canonical_json(head: Option<&PageHead>) -> serde_json::Result<String> {
        match head {
            Some(head) => serde_json::to_string(head),
            None => Ok("{}".to_string()),
        }
    }

    /// Inverse of [`PageHead::canonical_json`]; an empty object maps to `None`.
    pub fn from_stored_json(json: &str) -> serde_json::Result<Option<PageHead>> {
        if json.trim().is_empty() {
            return Ok(None);
        }
        let head: PageHead = serde_json::from_str(json)?;
        Ok((head != PageHead::default()).then_some(head))
    }

    /// `(field, value)` pairs for every URL-valued field that is set
    pub fn url_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = Vec::new();
        if !self.canonical_url.is_empty() {
            fields.push(("canonicalURL", self.canonical_url.as_str()));
        }
        if let Some(og) = &self.open_graph {
            if !og.url.is_empty() {
                fields.push(("openGraph.url", og.url.as_str()));
            }
            if !og.image.is_empty() {
                fields.push(("openGraph.image", og.image.as_str()));
            }
        }
        if let Some(tw) = &self.twitter {
            if !tw.url.is_empty() {
                fields.push(("twitter.url", tw.url.as_str()));
            }
            if !tw.image.is_empty() {
                fields.push(("twitter.image", tw.image.as_str()));
            }
        }
        fields
    }

    /// True when the robots meta tag excludes the page from indexing
    pub fn is_noindex(&self) -> bool {
        self.meta.get("robots").is_some_and(|v| {
            v.split(',')
                .map(|d| d.trim().to_ascii_lowercase())
                .any(|d| d == "noindex" || d == "none")
        })
    }
}

impl PageDoc {
    pub fn from_yaml(document: &str, bytes: &[u8]) -> Result<Self, ValidationError> {
        serde_yaml::from_slice(bytes).map_err(|e| ValidationError::InvalidDocument {
            document: document.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Component names in layout order
    pub fn includes(&self) -> Vec<String> {
        self.spec
            .layout
            .iter()
            .map(|item| item.include.clone())
            .collect()
    }
}
