use std::io;

use crate::ContentHash;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Mismatch {
        expected: ContentHash,
        actual: ContentHash,
    },

    #[error("invalid content hash '{0}': expected 64 hex digits")]
    InvalidHash(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
