use thiserror::Error;

/// Result type alias using SiteError
pub type Result<T> = std::result::Result<T, SiteError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure surfaced by the release engine is classified into one of
/// these kinds. Each kind maps to a stable code that callers (the CLI, tests,
/// an HTTP front end) can match on without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteErrorKind {
    // Caller errors
    /// Malformed or unsafe input: names, paths, hashes, modes, missing files
    InvalidInput,
    /// Website, environment or release absent
    NotFound,
    /// Rollback has no earlier non-failed release to target
    NoPreviousRelease,
    /// Rollback or promotion target directory is absent on disk
    MissingReleaseDir,

    // Integrity
    /// Promoted tree differs from its source
    HashMismatch,
    AlreadyExists,
    /// Stored state contradicts itself (e.g. active release missing from history)
    IntegrityViolation,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
    /// A pluggable collaborator (renderer, loader, image generator) failed
    ExternalService,
    Concurrency,

    // Internal
    Internal,
}

impl SiteErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            SiteErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            SiteErrorKind::NotFound => "ERR_NOT_FOUND",
            SiteErrorKind::NoPreviousRelease => "ERR_NO_PREVIOUS_RELEASE",
            SiteErrorKind::MissingReleaseDir => "ERR_MISSING_RELEASE_DIR",
            SiteErrorKind::HashMismatch => "ERR_HASH_MISMATCH",
            SiteErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            SiteErrorKind::IntegrityViolation => "ERR_INTEGRITY_VIOLATION",
            SiteErrorKind::Io => "ERR_IO",
            SiteErrorKind::Serialization => "ERR_SERIALIZATION",
            SiteErrorKind::Persistence => "ERR_PERSISTENCE",
            SiteErrorKind::ExternalService => "ERR_EXTERNAL_SERVICE",
            SiteErrorKind::Concurrency => "ERR_CONCURRENCY",
            SiteErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// True for errors the caller can fix by changing its input
    pub fn is_bad_request(&self) -> bool {
        matches!(self, SiteErrorKind::InvalidInput)
    }

    /// True for operational failures (storage, IO, collaborators)
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            SiteErrorKind::AlreadyExists
                | SiteErrorKind::IntegrityViolation
                | SiteErrorKind::Io
                | SiteErrorKind::Serialization
                | SiteErrorKind::Persistence
                | SiteErrorKind::ExternalService
                | SiteErrorKind::Concurrency
                | SiteErrorKind::Internal
        )
    }
}

/// Canonical structured error type
///
/// Carries a classification kind plus optional context about where the
/// failure happened. Context is attached with the `with_*` builders.
#[derive(Debug, Clone)]
pub struct SiteError {
    kind: SiteErrorKind,
    op: Option<String>,
    website: Option<String>,
    environment: Option<String>,
    release_id: Option<String>,
    path: Option<String>,
    message: String,
}

impl SiteError {
    /// Create a new error with the specified kind
    pub fn new(kind: SiteErrorKind) -> Self {
        Self {
            kind,
            op: None,
            website: None,
            environment: None,
            release_id: None,
            path: None,
            message: String::new(),
        }
    }

    /// Shorthand for an `InvalidInput` error with a message
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(SiteErrorKind::InvalidInput).with_message(message)
    }

    /// Shorthand for a `NotFound` error with a message
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SiteErrorKind::NotFound).with_message(message)
    }

    /// Shorthand for an `Internal` error with a message
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SiteErrorKind::Internal).with_message(message)
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add website context
    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    /// Add environment context
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Add release id context
    pub fn with_release_id(mut self, release_id: impl Into<String>) -> Self {
        self.release_id = Some(release_id.into());
        self
    }

    /// Add filesystem path context
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Prefix the message with extra context, keeping kind and fields
    pub fn context(mut self, prefix: impl AsRef<str>) -> Self {
        self.message = if self.message.is_empty() {
            prefix.as_ref().to_string()
        } else {
            format!("{}: {}", prefix.as_ref(), self.message)
        };
        self
    }

    pub fn kind(&self) -> SiteErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn is_bad_request(&self) -> bool {
        self.kind.is_bad_request()
    }

    pub fn is_internal(&self) -> bool {
        self.kind.is_internal()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    pub fn release_id(&self) -> Option<&str> {
        self.release_id.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for SiteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(website) = &self.website {
            write!(f, " (website: {})", website)?;
        }
        if let Some(environment) = &self.environment {
            write!(f, " (environment: {})", environment)?;
        }
        if let Some(release_id) = &self.release_id {
            write!(f, " (release: {})", release_id)?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path)?;
        }
        Ok(())
    }
}

impl std::error::Error for SiteError {}

impl From<std::io::Error> for SiteError {
    fn from(err: std::io::Error) -> Self {
        SiteError::new(SiteErrorKind::Io).with_message(err.to_string())
    }
}

impl From<serde_json::Error> for SiteError {
    fn from(err: serde_json::Error) -> Self {
        SiteError::new(SiteErrorKind::Serialization).with_message(err.to_string())
    }
}

// ========== End Error Facility ==========

/// Input validation failures raised before any write happens
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    EmptyName { field: String },

    #[error("invalid {field} {value:?}: {reason}")]
    InvalidName {
        field: String,
        value: String,
        reason: String,
    },

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid hash {hash:?}: expected sha256:<64 lowercase hex>")]
    InvalidHash { hash: String },

    #[error("hash mismatch for file {file}: declared {declared}, actual {actual}")]
    ContentHashMismatch {
        file: String,
        declared: String,
        actual: String,
    },

    #[error("manifest website {manifest:?} does not match requested website {requested:?}")]
    WebsiteMismatch { manifest: String, requested: String },

    #[error("unsupported resource kind {kind:?}")]
    UnsupportedKind { kind: String },

    #[error("resource {kind}/{name}: {reason}")]
    InvalidResource {
        kind: String,
        name: String,
        reason: String,
    },

    #[error("resource {kind}/{name} references file {file} which is not present in the bundle")]
    MissingFile {
        kind: String,
        name: String,
        file: String,
    },

    #[error("resource {kind}/{name} is flagged deleted but deletions are only allowed in partial mode")]
    DeleteInFullMode { kind: String, name: String },

    #[error("duplicate resource {kind}/{name}")]
    DuplicateResource { kind: String, name: String },

    #[error("invalid document {document}: {reason}")]
    InvalidDocument { document: String, reason: String },
}

impl From<ValidationError> for SiteError {
    fn from(err: ValidationError) -> Self {
        let message = err.to_string();
        let base = SiteError::bad_request(message);
        match err {
            ValidationError::InvalidPath { path, .. } => base.with_path(path),
            ValidationError::MissingFile { file, .. }
            | ValidationError::ContentHashMismatch { file, .. } => base.with_path(file),
            ValidationError::WebsiteMismatch { requested, .. } => base.with_website(requested),
            _ => base,
        }
    }
}
