//! Store-specific constructors for `SiteError`

use sitectl_core::errors::{SiteError, SiteErrorKind};

pub use sitectl_core::errors::Result;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> SiteError {
    SiteError::new(SiteErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// An applied migration whose SQL has since changed
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> SiteError {
    SiteError::new(SiteErrorKind::IntegrityViolation)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: recorded {}, embedded {}",
            migration_id, expected, actual
        ))
}

/// Blob key that is not 64 lowercase hex characters
pub fn invalid_digest(digest: &str) -> SiteError {
    SiteError::new(SiteErrorKind::InvalidInput)
        .with_op("blob_key")
        .with_message(format!("invalid blob digest {:?}", digest))
}

/// Create a missing blob error
pub fn blob_missing(digest: &str) -> SiteError {
    SiteError::new(SiteErrorKind::NotFound)
        .with_op("blob_read")
        .with_message(format!("blob not found for digest {}", digest))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> SiteError {
    SiteError::new(SiteErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> SiteError {
    SiteError::new(SiteErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Stored JSON column that no longer parses
pub fn corrupt_json(column: &str, err: serde_json::Error) -> SiteError {
    SiteError::new(SiteErrorKind::Serialization)
        .with_op("decode_row")
        .with_message(format!("column {}: {}", column, err))
}
