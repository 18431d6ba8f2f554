//! sitectl engine: release orchestration
//!
//! Coordinates the core model, the SQLite store and the blob store to
//! reconcile desired state, build and activate immutable releases, roll
//! back and promote between environments.

pub mod audit;
pub mod commands;
pub mod engine;
pub mod lock;
pub mod recovery;
pub mod release;

pub use commands::apply::{Applier, ApplyResult};
pub use commands::build::{BuildResult, Builder, SiteToolchain};
pub use commands::engine_command::{EngineCommand, EngineCommandResult};
pub use commands::promote::{PromoteResult, Promoter};
pub use commands::rollback::{rollback, RollbackResult};
pub use engine::{ReleaseEngine, ReleaseSummary};
pub use recovery::RecoveryReport;
pub use sitectl_store::repo::{AuditEntry, AuditOperation, AuditPage};
