//! `sitectl logs`

use clap::Args;
use sitectl_core::errors::{Result, SiteError};
use sitectl_engine::{AuditOperation, EngineCommand};

#[derive(Debug, Args)]
pub struct LogsArgs {
    pub website: String,

    /// Restrict to one environment
    pub environment: Option<String>,

    /// Restrict to one operation (apply, release.build, release.activate, rollback, promote)
    #[arg(long)]
    pub operation: Option<String>,

    /// Maximum number of entries (capped at 1000)
    #[arg(long, default_value_t = 50)]
    pub limit: i64,

    #[arg(long, default_value_t = 0)]
    pub offset: i64,
}

pub fn to_command(args: LogsArgs) -> Result<EngineCommand> {
    let operation = args
        .operation
        .as_deref()
        .map(|op| {
            AuditOperation::parse(op)
                .ok_or_else(|| SiteError::bad_request(format!("unknown operation {:?}", op)).with_op("logs"))
        })
        .transpose()?;
    Ok(EngineCommand::Logs {
        website: args.website,
        environment: args.environment,
        operation,
        limit: args.limit,
        offset: args.offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(operation: Option<&str>) -> LogsArgs {
        LogsArgs {
            website: "sample".to_string(),
            environment: None,
            operation: operation.map(str::to_string),
            limit: 50,
            offset: 0,
        }
    }

    #[test]
    fn test_operation_is_parsed() {
        match to_command(args(Some("release.build"))).unwrap() {
            EngineCommand::Logs { operation, .. } => {
                assert_eq!(operation, Some(AuditOperation::ReleaseBuild))
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_operation_is_bad_request() {
        let err = to_command(args(Some("deploy"))).unwrap_err();
        assert!(err.is_bad_request());
    }
}
