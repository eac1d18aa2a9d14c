//! Error types for packsync-fetch.

use std::io;
use std::path::PathBuf;

use packsync_verify::ContentHash;
use thiserror::Error;

use crate::core::is_retryable_status;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out {stage} {url}")]
    Timeout { url: String, stage: &'static str },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        expected: ContentHash,
        actual: ContentHash,
    },

    #[error("body of {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },

    #[error("file I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    /// Transport failures, timeouts and 5xx/408/429 responses are worth
    /// another attempt; everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => is_retryable_status(*status),
            Self::InvalidUrl(_)
            | Self::ChecksumMismatch { .. }
            | Self::TooLarge { .. }
            | Self::RetriesExhausted { .. }
            | Self::Io { .. } => false,
        }
    }

    /// The error behind any retry wrapper.
    pub fn root(&self) -> &FetchError {
        match self {
            Self::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
