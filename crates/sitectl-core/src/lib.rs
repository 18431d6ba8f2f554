//! sitectl core: shared vocabulary of the release engine
//!
//! - **Error facility**: [`errors::SiteError`] with a stable kind taxonomy
//! - **Logging facility**: structured operation logging and test capture
//! - **Validation**: names, bundle paths, content digests
//! - **Bundles**: manifest wire form and typed resource entries
//! - **Site model**: website/page documents and the loaded [`model::Site`]
//! - **Collaborators**: [`site::SiteLoader`], [`site::Renderer`],
//!   [`og::ImageGenerator`] and their bundled implementations

pub mod bundle;
pub mod config;
pub mod digest;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod names;
pub mod og;
pub mod site;
pub mod urls;

#[doc(hidden)]
pub use sitectl_core_types::schema as __schema;

pub use errors::{Result, SiteError, SiteErrorKind, ValidationError};
