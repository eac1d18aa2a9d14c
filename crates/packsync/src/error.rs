use std::path::PathBuf;

use packsync_verify::ContentHash;

/// Why a sync, or one file of it, did not succeed.
///
/// Messages of wrapped lower-level errors are flattened to strings so results
/// can be cloned into hooks and progress consumers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("manifest unavailable: {0}")]
    ManifestUnavailable(String),

    #[error("failed to scan '{path}': {message}")]
    ScanIo { path: PathBuf, message: String },

    #[error("hash mismatch for '{path}': expected {expected}, got {actual}")]
    HashMismatch {
        path: String,
        expected: ContentHash,
        actual: ContentHash,
    },

    #[error("failed to transfer '{path}': {message}")]
    Transfer { path: String, message: String },

    #[error("archive unavailable: {0}")]
    ArchiveUnavailable(String),

    #[error("archive corrupt: {0}")]
    ArchiveCorrupt(String),

    #[error("failed to apply '{path}': {message}")]
    ApplyIo { path: PathBuf, message: String },

    #[error("sync cancelled")]
    Cancelled,

    #[error("path traversal rejected: '{0}'")]
    PathTraversalRejected(String),

    #[error("{failed} of {attempted} file transfers failed")]
    TooManyFailures { failed: usize, attempted: usize },

    #[error("source '{name}' is unusable: {reason}")]
    SourceUnusable { name: String, reason: String },
}

impl SyncError {
    pub(crate) fn apply_io(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        Self::ApplyIo {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

/// Problems with [`SyncOptions`](crate::SyncOptions) or the HTTP client,
/// reported before any sync starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid option '{field}': {reason}")]
    InvalidOption { field: &'static str, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] packsync_fetch::FetchError),
}

/// Final outcome of one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    Success,
    /// The sync applied, but the listed files kept their previous content
    /// (or stayed absent) because their transfer failed.
    SuccessWithWarnings(Vec<String>),
    Failure(SyncError),
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Failure(SyncError::Cancelled))
    }

    /// Files that were left untouched after a failed transfer.
    pub fn skipped(&self) -> &[String] {
        match self {
            Self::SuccessWithWarnings(paths) => paths,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            Self::Failure(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SyncError> for SyncResult {
    fn from(error: SyncError) -> Self {
        Self::Failure(error)
    }
}
