//! On-disk layout of one environment
//!
//! ```text
//! <websites_root>/<website>/envs/<env>/
//!   releases/<id>/        finalized release
//!   releases/<id>.tmp/    release being assembled
//!   build/<id>/           materialized source tree
//!   build/<id>.ogprobe/   social image preflight
//!   current -> releases/<id>
//!   .current.tmp          pointer being swapped in
//!   .lock                 advisory lock file
//! ```

use std::path::{Path, PathBuf};

pub const RELEASES_DIR: &str = "releases";
pub const BUILD_DIR: &str = "build";
pub const CURRENT_LINK: &str = "current";
pub const CURRENT_TMP_LINK: &str = ".current.tmp";
pub const LOCK_FILE: &str = ".lock";
pub const TMP_SUFFIX: &str = ".tmp";
pub const OG_PROBE_SUFFIX: &str = ".ogprobe";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvLayout {
    env_dir: PathBuf,
}

impl EnvLayout {
    pub fn new(websites_root: &Path, website: &str, environment: &str) -> Self {
        Self {
            env_dir: websites_root.join(website).join("envs").join(environment),
        }
    }

    pub fn env_dir(&self) -> &Path {
        &self.env_dir
    }

    pub fn releases_root(&self) -> PathBuf {
        self.env_dir.join(RELEASES_DIR)
    }

    pub fn build_root(&self) -> PathBuf {
        self.env_dir.join(BUILD_DIR)
    }

    pub fn release_dir(&self, release_id: &str) -> PathBuf {
        self.releases_root().join(release_id)
    }

    pub fn tmp_release_dir(&self, release_id: &str) -> PathBuf {
        self.releases_root()
            .join(format!("{}{}", release_id, TMP_SUFFIX))
    }

    pub fn source_dir(&self, release_id: &str) -> PathBuf {
        self.build_root().join(release_id)
    }

    pub fn og_probe_dir(&self, release_id: &str) -> PathBuf {
        self.build_root()
            .join(format!("{}{}", release_id, OG_PROBE_SUFFIX))
    }

    pub fn current_link(&self) -> PathBuf {
        self.env_dir.join(CURRENT_LINK)
    }

    pub fn current_tmp_link(&self) -> PathBuf {
        self.env_dir.join(CURRENT_TMP_LINK)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.env_dir.join(LOCK_FILE)
    }
}

/// Relative pointer target for a release, e.g. `releases/<id>`
pub fn release_target(release_id: &str) -> String {
    format!("{}/{}", RELEASES_DIR, release_id)
}

/// Release id named by a pointer target, if it has the `releases/<id>` shape
pub fn release_id_from_target(target: &str) -> Option<&str> {
    let id = target
        .trim_end_matches('/')
        .strip_prefix(RELEASES_DIR)?
        .strip_prefix('/')?;
    (!id.is_empty() && !id.contains('/')).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = EnvLayout::new(Path::new("/srv/sites"), "sample", "staging");
        assert_eq!(
            layout.release_dir("r1"),
            PathBuf::from("/srv/sites/sample/envs/staging/releases/r1")
        );
        assert_eq!(
            layout.tmp_release_dir("r1"),
            PathBuf::from("/srv/sites/sample/envs/staging/releases/r1.tmp")
        );
        assert_eq!(
            layout.og_probe_dir("r1"),
            PathBuf::from("/srv/sites/sample/envs/staging/build/r1.ogprobe")
        );
    }

    #[test]
    fn test_release_id_from_target() {
        assert_eq!(release_id_from_target(&release_target("abc")), Some("abc"));
        assert_eq!(release_id_from_target("releases/abc/"), Some("abc"));
        assert_eq!(release_id_from_target("elsewhere/abc"), None);
        assert_eq!(release_id_from_target("releases/"), None);
    }
}
