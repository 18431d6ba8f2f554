//! Blob path layout

use std::path::{Path, PathBuf};

/// `<root>/<hex[0..2]>/<hex>`; callers validate `hex` first
pub fn shard_path(root: &Path, hex: &str) -> PathBuf {
    let prefix = hex.get(..2).unwrap_or("00");
    root.join(prefix).join(hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_path_uses_two_char_prefix() {
        let digest = "ab".to_string() + &"0".repeat(62);
        let path = shard_path(Path::new("/blobs"), &digest);
        assert_eq!(path, PathBuf::from(format!("/blobs/ab/{}", digest)));
    }
}
