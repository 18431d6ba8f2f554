//! Wire form of a bundle manifest (`manifest.json`)

use serde::{Deserialize, Serialize};

/// Reconciliation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// The bundle is the complete desired state; unlisted rows are deleted
    Full,
    /// Only listed resources change; deletions must be flagged explicitly
    Partial,
}

impl ApplyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyMode::Full => "full",
            ApplyMode::Partial => "partial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    pub mode: ApplyMode,
    pub website: String,
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
}

/// One resource as declared by the bundle producer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub file: String,
    pub hash: String,
}

impl ResourceDescriptor {
    /// `file`/`hash` followed by `files`, trimmed
    pub fn file_entries(&self) -> Vec<FileDescriptor> {
        let mut out = Vec::with_capacity(self.files.len() + 1);
        if !self.file.trim().is_empty() || !self.hash.trim().is_empty() {
            out.push(FileDescriptor {
                file: self.file.trim().to_string(),
                hash: self.hash.trim().to_string(),
            });
        }
        out.extend(self.files.iter().map(|f| FileDescriptor {
            file: f.file.trim().to_string(),
            hash: f.hash.trim().to_string(),
        }));
        out
    }
}

impl Manifest {
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
