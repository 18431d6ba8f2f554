//! Control-plane configuration (`sitectl.toml`)

use crate::errors::{Result, SiteError, SiteErrorKind};
use crate::logging_facility::Profile;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "SITECTL_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "sitectl.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root for every relative path below
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub blobs_dir: PathBuf,
    pub websites_root: PathBuf,
    pub log_profile: Profile,
    /// Name recorded as the actor of audit entries
    pub actor: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".sitectl"),
            db_path: PathBuf::from("sitectl.db"),
            blobs_dir: PathBuf::from("blobs"),
            websites_root: PathBuf::from("websites"),
            log_profile: Profile::Development,
            actor: "local".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| {
            SiteError::new(SiteErrorKind::InvalidInput)
                .with_op("load_config")
                .with_message(e.to_string())
        })
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(SiteError::from(e)
                .with_op("load_config")
                .with_path(path.display().to_string())),
        }
    }

    /// Explicit path, then `$SITECTL_CONFIG`, then `./sitectl.toml`
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load(&path)
    }

    fn under_data_dir(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn resolve_db_path(&self) -> PathBuf {
        self.under_data_dir(&self.db_path)
    }

    pub fn resolve_blobs_dir(&self) -> PathBuf {
        self.under_data_dir(&self.blobs_dir)
    }

    pub fn resolve_websites_root(&self) -> PathBuf {
        self.under_data_dir(&self.websites_root)
    }
}
