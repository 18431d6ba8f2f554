//! Migration framework
//!
//! - Embedded SQL, applied in order, one transaction per migration
//! - Checksums recorded per migration and verified on every run

mod checksums;
mod embedded;
mod runner;

pub use runner::{apply_migrations, applied_migrations};
