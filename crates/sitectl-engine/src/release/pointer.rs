//! The per-environment `current` pointer
//!
//! `current` is a relative symlink to `releases/<id>`. It is never rewritten
//! in place: a new link is created at `.current.tmp` and renamed over it.

use crate::release::fsutil::{io_at, make_symlink};
use crate::release::layout::{release_id_from_target, release_target, EnvLayout};
use sitectl_core::errors::{Result, SiteError, SiteErrorKind};
use std::fs;
use std::io::ErrorKind;

/// Raw target of `current`, `None` when the pointer does not exist
pub fn read_current_target(layout: &EnvLayout) -> Result<Option<String>> {
    let link = layout.current_link();
    match fs::read_link(&link) {
        Ok(target) => Ok(Some(target.to_string_lossy().replace('\\', "/"))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_at("read_current", &link, e)),
    }
}

/// Release id `current` points at, if any
pub fn read_current_release(layout: &EnvLayout) -> Result<Option<String>> {
    Ok(read_current_target(layout)?
        .as_deref()
        .and_then(release_id_from_target)
        .map(str::to_string))
}

/// Point `current` at `target`, or remove it when `target` is `None`
pub fn set_current_target(layout: &EnvLayout, target: Option<&str>) -> Result<()> {
    let link = layout.current_link();
    let Some(target) = target.filter(|t| !t.is_empty()) else {
        return match fs::remove_file(&link) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_at("remove_current", &link, e)),
        };
    };

    let tmp = layout.current_tmp_link();
    match fs::remove_file(&tmp) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(io_at("switch_current", &tmp, e)),
    }
    make_symlink(std::path::Path::new(target), &tmp).map_err(|e| io_at("switch_current", &tmp, e))?;
    if let Err(e) = fs::rename(&tmp, &link) {
        let _ = fs::remove_file(&tmp);
        return Err(io_at("switch_current", &link, e));
    }
    Ok(())
}

/// Point `current` at `releases/<release_id>`
pub fn switch_current(layout: &EnvLayout, release_id: &str) -> Result<()> {
    if release_id.is_empty() {
        return Err(SiteError::new(SiteErrorKind::InvalidInput)
            .with_op("switch_current")
            .with_message("release id is required"));
    }
    set_current_target(layout, Some(&release_target(release_id)))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout(dir: &TempDir) -> EnvLayout {
        let layout = EnvLayout::new(dir.path(), "sample", "staging");
        fs::create_dir_all(layout.releases_root()).unwrap();
        layout
    }

    #[test]
    fn test_switch_and_read() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        assert_eq!(read_current_target(&layout).unwrap(), None);

        switch_current(&layout, "r1").unwrap();
        switch_current(&layout, "r2").unwrap();

        assert_eq!(
            read_current_target(&layout).unwrap().as_deref(),
            Some("releases/r2")
        );
        assert_eq!(read_current_release(&layout).unwrap().as_deref(), Some("r2"));
        assert!(!layout.current_tmp_link().exists());
    }

    #[test]
    fn test_set_none_removes_pointer() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        switch_current(&layout, "r1").unwrap();

        set_current_target(&layout, None).unwrap();
        set_current_target(&layout, None).unwrap();

        assert_eq!(read_current_target(&layout).unwrap(), None);
    }

    #[test]
    fn test_pointer_resolves_to_release_dir() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        fs::create_dir_all(layout.release_dir("r1")).unwrap();
        fs::write(layout.release_dir("r1").join("index.html"), "hi").unwrap();

        switch_current(&layout, "r1").unwrap();

        assert_eq!(
            fs::read_to_string(layout.current_link().join("index.html")).unwrap(),
            "hi"
        );
    }
}
