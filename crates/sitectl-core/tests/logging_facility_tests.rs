#![allow(clippy::unwrap_used, clippy::expect_used)]

use sitectl_core::errors::SiteError;
use sitectl_core::logging_facility::test_capture::init_test_capture;
use sitectl_core::{log_op_end, log_op_error, log_op_start};
use sitectl_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_ERR_CODE};

#[test]
fn test_log_op_start_records_fields() {
    let capture = init_test_capture();
    let op = "test_log_op_start_unique_1";

    log_op_start!(op, website = "sample", environment = "staging");

    let events = capture.find(op, EVENT_START);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].field("website"), Some("sample"));
    assert_eq!(events[0].field("environment"), Some("staging"));
    assert!(events[0].field("component").is_some());
}

#[test]
fn test_log_op_end_records_duration() {
    let capture = init_test_capture();
    let op = "test_log_op_end_unique_2";

    log_op_end!(op, duration_ms = 42, release_id = "r1");

    let events = capture.find(op, EVENT_END);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].field("duration_ms"), Some("42"));
    assert_eq!(events[0].field("release_id"), Some("r1"));
}

#[test]
fn test_log_op_error_records_code() {
    let capture = init_test_capture();
    let op = "test_log_op_error_unique_3";

    let err = SiteError::not_found("website sample not found");
    log_op_error!(op, err, duration_ms = 7);

    let events = capture.find(op, EVENT_END_ERROR);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].field(FIELD_ERR_CODE), Some("ERR_NOT_FOUND"));
    assert_eq!(events[0].level, tracing::Level::ERROR);
}

#[test]
fn test_start_and_end_are_paired() {
    let capture = init_test_capture();
    let op = "test_boundary_pairing_unique_4";

    log_op_start!(op);
    log_op_end!(op, duration_ms = 1);

    let count = capture.count_events(|e| e.op.as_deref() == Some(op));
    assert_eq!(count, 2);
    capture.assert_event_exists(op, EVENT_START);
    capture.assert_event_exists(op, EVENT_END);
}
