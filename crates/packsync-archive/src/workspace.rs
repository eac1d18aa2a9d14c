use std::io::{Read, Seek};
use std::path::Path;

use packsync_fs::Workspace;

use crate::error::Result;
use crate::extract::extract_from_reader;
use crate::options::ExtractOptions;
use crate::report::ArchiveReport;

/// An archive unpacked next to its destination, not yet swapped in.
#[derive(Debug)]
pub struct WorkspaceExtraction {
    workspace: Workspace,
    report: ArchiveReport,
}

impl WorkspaceExtraction {
    /// Swap the extracted tree into the destination.
    pub fn commit(self) -> Result<ArchiveReport> {
        self.workspace.commit()?;
        Ok(self.report)
    }

    /// Discard the extracted tree.
    pub fn abort(self) {
        drop(self.workspace);
    }

    pub fn report(&self) -> &ArchiveReport {
        &self.report
    }

    pub fn path(&self) -> &Path {
        self.workspace.path()
    }
}

/// Extract into a fresh staging directory adjacent to `destination`.
///
/// `destination` itself is never written; on error the staging directory is
/// removed.
pub fn extract_to_workspace<R: Read + Seek>(
    reader: R,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<WorkspaceExtraction> {
    let workspace = Workspace::adjacent(destination, "archive")?;
    let report = extract_from_reader(reader, workspace.path(), options)?;
    Ok(WorkspaceExtraction { workspace, report })
}
