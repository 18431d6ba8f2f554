//! sitectl store: persistence for desired state and release history
//!
//! - SQLite schema with an embedded, checksummed migrations runner
//! - Content-addressed blob store for resource bytes and generated images
//! - Repository functions over rusqlite connections and transactions

pub mod cas;
pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;

pub use cas::BlobStore;
pub use errors::Result;
pub use repo::SqliteRepo;
