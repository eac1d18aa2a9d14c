use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("archive is corrupted: {0}")]
    Corrupted(String),

    #[error("zip-slip attack detected: entry '{entry}' escapes the extraction root")]
    ZipSlip { entry: String },

    #[error("entry '{entry}' has an unusable path")]
    InvalidPath { entry: String },

    #[error("entry '{entry}' is nested under file entry '{file}'")]
    Conflict { entry: String, file: String },

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("workspace operation failed: {0}")]
    Workspace(#[from] packsync_fs::Error),
}

impl Error {
    /// Entry paths that would land outside the root.
    pub fn is_traversal(&self) -> bool {
        matches!(self, Self::ZipSlip { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
