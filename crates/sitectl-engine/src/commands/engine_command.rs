//! Engine commands as data, for front ends that dispatch by value.

#![allow(clippy::result_large_err)]

use crate::commands::apply::ApplyResult;
use crate::commands::build::BuildResult;
use crate::commands::promote::PromoteResult;
use crate::commands::rollback::RollbackResult;
use crate::engine::{ReleaseEngine, ReleaseSummary};
use crate::recovery::RecoveryReport;
use serde::Serialize;
use sitectl_core::bundle::Bundle;
use sitectl_core::errors::Result;
use sitectl_store::repo::{AuditOperation, AuditPage};

#[derive(Debug, Clone)]
pub enum EngineCommand {
    Apply {
        website: String,
        environment: String,
        bundle: Bundle,
        dry_run: bool,
    },
    Build {
        website: String,
        environment: String,
    },
    Rollback {
        website: String,
        environment: String,
    },
    Promote {
        website: String,
        source_env: String,
        target_env: String,
    },
    Releases {
        website: String,
        environment: String,
    },
    Logs {
        website: String,
        environment: Option<String>,
        operation: Option<AuditOperation>,
        limit: i64,
        offset: i64,
    },
    Recover,
}

/// Result of one engine command; serializes as the inner result
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EngineCommandResult {
    Apply(ApplyResult),
    Build(BuildResult),
    Rollback(RollbackResult),
    Promote(PromoteResult),
    Releases(Vec<ReleaseSummary>),
    Logs(AuditPage),
    Recover(RecoveryReport),
}

/// Run `cmd` against `engine`
///
/// # Errors
///
/// Whatever the underlying operation returns.
pub fn apply_engine_command(cmd: EngineCommand, engine: &mut ReleaseEngine) -> Result<EngineCommandResult> {
    match cmd {
        EngineCommand::Apply {
            website,
            environment,
            bundle,
            dry_run,
        } => engine
            .apply(&website, &environment, &bundle, dry_run)
            .map(EngineCommandResult::Apply),
        EngineCommand::Build { website, environment } => engine
            .build(&website, &environment)
            .map(EngineCommandResult::Build),
        EngineCommand::Rollback { website, environment } => engine
            .rollback(&website, &environment)
            .map(EngineCommandResult::Rollback),
        EngineCommand::Promote {
            website,
            source_env,
            target_env,
        } => engine
            .promote(&website, &source_env, &target_env)
            .map(EngineCommandResult::Promote),
        EngineCommand::Releases { website, environment } => engine
            .releases(&website, &environment)
            .map(EngineCommandResult::Releases),
        EngineCommand::Logs {
            website,
            environment,
            operation,
            limit,
            offset,
        } => engine
            .audit_log(&website, environment.as_deref(), operation, limit, offset)
            .map(EngineCommandResult::Logs),
        EngineCommand::Recover => engine.recover().map(EngineCommandResult::Recover),
    }
}
