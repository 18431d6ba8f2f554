//! Release operations.
//!
//! Each operation takes explicit collaborators (connection, blob store,
//! websites root, site toolchain) and is wrapped by [`crate::ReleaseEngine`]
//! for locking and operation logging.

pub mod apply;
pub mod build;
pub mod engine_command;
pub mod promote;
pub mod rollback;
