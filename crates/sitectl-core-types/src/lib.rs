//! Types shared by the sitectl error and logging facilities
//!
//! - **Schema constants**: canonical field keys and event names used by every
//!   structured log line emitted by the release engine

pub mod schema;
