//! Audit trail for mutating operations
//!
//! Entries are written after the operation has committed. A failed write
//! is logged at error level and never fails the operation it describes.

#![allow(clippy::result_large_err)]

use crate::commands::apply::ApplyResult;
use crate::commands::build::BuildResult;
use crate::commands::promote::PromoteResult;
use crate::commands::rollback::RollbackResult;
use rusqlite::Connection;
use serde_json::json;
use sitectl_core::errors::{Result, SiteError};
use sitectl_store::repo::{AuditOperation, NewAuditEntry};
use sitectl_store::SqliteRepo;

pub const DEFAULT_ACTOR: &str = "local";

/// One entry to append, before the environment is resolved
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub operation: AuditOperation,
    pub summary: String,
    pub release_id: Option<String>,
    pub metadata: serde_json::Value,
}

/// Append `records` to the log of `website`/`environment`
pub fn record(conn: &Connection, actor: &str, website: &str, environment: &str, records: Vec<AuditRecord>) {
    for rec in records {
        let operation = rec.operation;
        if let Err(e) = write(conn, actor, website, environment, rec) {
            tracing::error!(
                website,
                environment,
                operation = operation.as_str(),
                err.code = e.code(),
                error = %e,
                "audit write failed"
            );
        }
    }
}

fn write(conn: &Connection, actor: &str, website: &str, environment: &str, rec: AuditRecord) -> Result<()> {
    let env_id = SqliteRepo::get_website_by_name(conn, website)?
        .map(|w| SqliteRepo::get_environment(conn, w.id, environment))
        .transpose()?
        .flatten()
        .map(|env| env.id)
        .ok_or_else(|| {
            SiteError::not_found(format!("environment {:?} not found", environment))
                .with_op("audit")
                .with_website(website)
                .with_environment(environment)
        })?;
    SqliteRepo::insert_audit(
        conn,
        &NewAuditEntry {
            actor: actor.to_string(),
            environment_id: env_id,
            operation: rec.operation,
            resource_summary: rec.summary,
            release_id: rec.release_id,
            metadata: rec.metadata,
        },
    )?;
    Ok(())
}

pub fn for_apply(result: &ApplyResult) -> Vec<AuditRecord> {
    if result.dry_run {
        return Vec::new();
    }
    vec![AuditRecord {
        operation: AuditOperation::Apply,
        summary: format!(
            "applied {} resources ({} created, {} updated, {} deleted)",
            result.accepted.len(),
            result.created,
            result.updated,
            result.deleted
        ),
        release_id: None,
        metadata: json!({
            "mode": result.mode.as_str(),
            "acceptedCount": result.accepted.len(),
            "created": result.created,
            "updated": result.updated,
            "deleted": result.deleted,
        }),
    }]
}

/// A successful build records the build and the activation separately
pub fn for_build(result: &BuildResult) -> Vec<AuditRecord> {
    vec![
        AuditRecord {
            operation: AuditOperation::ReleaseBuild,
            summary: format!("built release {}", result.release_id),
            release_id: Some(result.release_id.clone()),
            metadata: json!({ "status": "active" }),
        },
        AuditRecord {
            operation: AuditOperation::ReleaseActivate,
            summary: format!("activated release {}", result.release_id),
            release_id: Some(result.release_id.clone()),
            metadata: json!({ "previousReleaseId": result.previous_release_id }),
        },
    ]
}

pub fn for_rollback(result: &RollbackResult) -> Vec<AuditRecord> {
    vec![AuditRecord {
        operation: AuditOperation::Rollback,
        summary: format!(
            "rolled back release {} -> {}",
            result.from_release_id, result.to_release_id
        ),
        release_id: Some(result.to_release_id.clone()),
        metadata: json!({
            "fromReleaseId": result.from_release_id,
            "toReleaseId": result.to_release_id,
        }),
    }]
}

/// Recorded against the target environment
pub fn for_promote(result: &PromoteResult) -> Vec<AuditRecord> {
    vec![AuditRecord {
        operation: AuditOperation::Promote,
        summary: format!(
            "promoted release {} from {} to {} as {}",
            result.source_release_id,
            result.source_environment,
            result.target_environment,
            result.release_id
        ),
        release_id: Some(result.release_id.clone()),
        metadata: json!({
            "fromEnvironment": result.source_environment,
            "toEnvironment": result.target_environment,
            "sourceReleaseId": result.source_release_id,
            "releaseId": result.release_id,
            "previousReleaseId": result.previous_release_id,
            "fileCount": result.file_count,
            "hash": result.hash,
            "strategy": result.strategy.as_str(),
        }),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitectl_core::bundle::ApplyMode;

    fn applied(dry_run: bool) -> ApplyResult {
        ApplyResult {
            website: "sample".to_string(),
            environment: "staging".to_string(),
            mode: ApplyMode::Partial,
            dry_run,
            accepted: Vec::new(),
            created: 1,
            updated: 2,
            deleted: 0,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_dry_run_apply_is_not_recorded() {
        assert!(for_apply(&applied(true)).is_empty());
    }

    #[test]
    fn test_apply_record_carries_mode_and_counts() {
        let records = for_apply(&applied(false));

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation, AuditOperation::Apply);
        assert_eq!(records[0].metadata["mode"], "partial");
        assert_eq!(records[0].metadata["updated"], 2);
        assert_eq!(records[0].release_id, None);
    }

    #[test]
    fn test_rollback_summary_names_both_releases() {
        let records = for_rollback(&RollbackResult {
            website: "sample".to_string(),
            environment: "staging".to_string(),
            from_release_id: "r2".to_string(),
            to_release_id: "r1".to_string(),
        });

        assert_eq!(records[0].summary, "rolled back release r2 -> r1");
        assert_eq!(records[0].release_id.as_deref(), Some("r1"));
        assert_eq!(records[0].metadata["fromReleaseId"], "r2");
    }
}
