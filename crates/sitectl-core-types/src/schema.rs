//! Canonical schema constants for structured logging and events
//!
//! Every crate logs through these keys so log processors can rely on them.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Entity identifiers
pub const FIELD_WEBSITE: &str = "website";
pub const FIELD_ENVIRONMENT: &str = "environment";
pub const FIELD_RELEASE_ID: &str = "release_id";
pub const FIELD_SOURCE_ENVIRONMENT: &str = "source_environment";
pub const FIELD_TARGET_ENVIRONMENT: &str = "target_environment";

// Change summaries
pub const FIELD_CREATED: &str = "created";
pub const FIELD_UPDATED: &str = "updated";
pub const FIELD_DELETED: &str = "deleted";
pub const FIELD_DRY_RUN: &str = "dry_run";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

// Canonical operation names
pub const OP_APPLY: &str = "apply";
pub const OP_BUILD: &str = "build";
pub const OP_ROLLBACK: &str = "rollback";
pub const OP_PROMOTE: &str = "promote";
pub const OP_RECOVER: &str = "recover";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_distinct() {
        assert_ne!(EVENT_START, EVENT_END);
        assert_ne!(EVENT_START, EVENT_END_ERROR);
        assert_ne!(EVENT_END, EVENT_END_ERROR);
    }

    #[test]
    fn test_operation_names_are_distinct() {
        let ops = [OP_APPLY, OP_BUILD, OP_ROLLBACK, OP_PROMOTE, OP_RECOVER];
        for (i, a) in ops.iter().enumerate() {
            for b in &ops[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_error_fields_are_namespaced() {
        assert!(FIELD_ERR_KIND.starts_with("err."));
        assert!(FIELD_ERR_CODE.starts_with("err."));
    }
}
