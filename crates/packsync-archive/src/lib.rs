//! Zip extraction with path sanitization and staged placement.
//!
//! Archives are always unpacked into a fresh directory beside their
//! destination ([`extract_to_workspace`]); the destination only changes when
//! the caller commits.

pub use error::{Error, Result};
pub use extract::extract_from_reader;
pub use options::{ExtractOptions, Progress};
pub use report::{ArchiveReport, EntryKind, ExtractedEntry};
pub use sanitize::{SanitizedPath, sanitize_entry_name};
pub use workspace::{WorkspaceExtraction, extract_to_workspace};

mod error;
mod extract;
mod options;
mod report;
mod sanitize;
mod workspace;
