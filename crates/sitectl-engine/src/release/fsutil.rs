//! Filesystem helpers shared by build, rollback, promotion and recovery

use sitectl_core::errors::{Result, SiteError};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

/// Attach an operation and path to an I/O failure
pub fn io_at(op: &str, path: &Path, err: io::Error) -> SiteError {
    SiteError::from(err)
        .with_op(op)
        .with_path(path.display().to_string())
}

/// Write `content` to `path`, creating parent directories
pub fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_at("write_file", parent, e))?;
    }
    fs::write(path, content).map_err(|e| io_at("write_file", path, e))
}

/// Remove a directory tree; a missing directory is not an error.
/// Returns whether anything was removed.
pub fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_at("remove_dir", path, e)),
    }
}

/// How a file reached its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Hardlink,
    Copy,
}

/// Hardlink `src` to `dst`, falling back to a byte copy (cross-device,
/// permission denied, unsupported filesystem)
pub fn link_or_copy(src: &Path, dst: &Path) -> Result<Placement> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| io_at("link_or_copy", parent, e))?;
    }
    let link_err = match fs::hard_link(src, dst) {
        Ok(()) => return Ok(Placement::Hardlink),
        Err(e) => e,
    };
    match fs::copy(src, dst) {
        Ok(_) => Ok(Placement::Copy),
        Err(copy_err) => Err(io_at("link_or_copy", dst, copy_err).context(format!(
            "link {} failed ({}); copy fallback failed",
            src.display(),
            link_err
        ))),
    }
}

/// Recreate the symlink at `src` as a symlink at `dst`, target unchanged
pub fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = fs::read_link(src).map_err(|e| io_at("copy_symlink", src, e))?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| io_at("copy_symlink", parent, e))?;
    }
    make_symlink(&target, dst).map_err(|e| io_at("copy_symlink", dst, e))
}

#[cfg(unix)]
pub fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    let resolved = link.parent().map(|p| p.join(target));
    if resolved.as_deref().is_some_and(Path::is_dir) {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_link_or_copy_prefers_hardlink() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("blob");
        fs::write(&src, b"png").unwrap();

        let placement = link_or_copy(&src, &dir.path().join("og/home.png")).unwrap();

        assert_eq!(placement, Placement::Hardlink);
        assert_eq!(fs::read(dir.path().join("og/home.png")).unwrap(), b"png");
    }

    #[test]
    fn test_remove_dir_if_exists() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("scratch");
        fs::create_dir_all(target.join("nested")).unwrap();

        assert!(remove_dir_if_exists(&target).unwrap());
        assert!(!remove_dir_if_exists(&target).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_symlink_keeps_target() {
        let dir = TempDir::new().unwrap();
        make_symlink(Path::new("index.html"), &dir.path().join("a")).unwrap();

        copy_symlink(&dir.path().join("a"), &dir.path().join("out/b")).unwrap();

        assert_eq!(
            fs::read_link(dir.path().join("out/b")).unwrap(),
            Path::new("index.html")
        );
    }
}
