//! Subcommand argument parsing and output

pub mod apply;
pub mod logs;
pub mod release;

use serde::Serialize;
use sitectl_core::errors::SiteError;

/// 2 for errors the caller can fix, 1 for everything else
pub fn exit_code(err: &SiteError) -> i32 {
    if err.is_bad_request() {
        2
    } else {
        1
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), SiteError> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{}", text);
    Ok(())
}
