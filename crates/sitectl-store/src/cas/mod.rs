//! Content-addressed blob storage
//!
//! Blobs live at `<root>/<first two hex chars>/<hex digest>`. Writes go
//! through a uniquely named temp file and a rename, so concurrent writers of
//! the same blob never expose a partial file.

mod atomic;
mod blob_store;
mod sharding;

pub use atomic::atomic_write;
pub use blob_store::BlobStore;
pub use sharding::shard_path;
