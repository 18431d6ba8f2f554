//! Release identifiers
//!
//! UUIDv7 strings: globally unique and lexically sortable by creation time.
//! A process-wide guard keeps them strictly increasing even when two ids
//! are minted within the same millisecond.

use std::sync::Mutex;
use uuid::Uuid;

static LAST_ID: Mutex<Option<Uuid>> = Mutex::new(None);

/// Mint a new release id
pub fn new_release_id() -> String {
    let candidate = Uuid::now_v7();
    let mut last = match LAST_ID.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let id = match *last {
        // Bumps the random tail only; version and variant bits are untouched
        // unless rand_b is all ones.
        Some(prev) if candidate <= prev => Uuid::from_u128(prev.as_u128() + 1),
        _ => candidate,
    };
    *last = Some(id);
    id.to_string()
}
