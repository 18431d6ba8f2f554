//! Structured site documents
//!
//! Website and page definitions are authored as YAML and persisted as
//! canonical JSON fragments; both encodings come from the same serde types.

pub mod page;
pub mod site;
pub mod website;

pub use page::{JsonLdBlock, LayoutItem, OpenGraph, PageDoc, PageHead, PageSpec, TwitterCard};
pub use site::{Component, Site, StyleSet};
pub use website::{
    IconSlot, Metadata, RobotsGroup, SitemapSettings, WebsiteDoc, WebsiteHead, WebsiteIcons,
    WebsiteRobots, WebsiteSeo, WebsiteSpec,
};
