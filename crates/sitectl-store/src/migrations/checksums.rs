//! Migration checksums

use sitectl_core::digest::sha256_hex;

/// SHA-256 of the migration SQL
pub fn compute_checksum(content: &str) -> String {
    sha256_hex(content.as_bytes())
}
