//! Release directory plumbing shared by build, rollback and promotion

pub mod build_log;
pub mod cleanup;
pub mod fsutil;
pub mod layout;
pub mod outputs;
pub mod pointer;
pub mod release_id;

pub use build_log::BuildLog;
pub use cleanup::CleanupStack;
pub use layout::EnvLayout;
pub use outputs::OutputHashes;
pub use release_id::new_release_id;
