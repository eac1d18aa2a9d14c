//! Whole-pack fallback: download the zip and unpack it next to the target.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use packsync_archive::{ExtractOptions, WorkspaceExtraction, extract_to_workspace};
use packsync_fetch::{Fetcher, HttpClient, Progress};
use packsync_fs::Workspace;

use crate::cancel::CancellationToken;
use crate::config::SyncOptions;
use crate::error::SyncError;
use crate::progress::ProgressTracker;
use crate::source::BaseUrl;

const ARCHIVE_KEY: &str = "<archive>";

pub struct ArchiveFetcher<'a, C: HttpClient> {
    fetcher: &'a Fetcher<C>,
    options: &'a SyncOptions,
}

impl<'a, C: HttpClient> ArchiveFetcher<'a, C> {
    pub fn new(fetcher: &'a Fetcher<C>, options: &'a SyncOptions) -> Self {
        Self { fetcher, options }
    }

    /// Download the source archive and extract it into a staging tree beside
    /// `target`. Nothing under `target` is touched; the returned extraction
    /// is swapped in by the applier.
    pub(crate) async fn fetch(
        &self,
        base: &BaseUrl,
        target: &Path,
        tracker: &Arc<ProgressTracker>,
        cancel: &CancellationToken,
    ) -> Result<WorkspaceExtraction, SyncError> {
        let download = Workspace::adjacent(target, "download")
            .map_err(|e| SyncError::apply_io(target, e))?;
        let zip_path = download.path().join("pack.zip");
        let url = base.join(&self.options.archive_path);

        let download_tracker = Arc::clone(tracker);
        let options = self.options.fetch_options().on_progress(Arc::new(move |p: &Progress| {
            download_tracker.record_bytes(ARCHIVE_KEY, p.bytes_downloaded, p.total_bytes)
        }));
        let fetched = self
            .fetcher
            .fetch(&url, &zip_path, &options)
            .await
            .map_err(|e| SyncError::ArchiveUnavailable(e.to_string()))?;
        tracing::info!(url = %url, bytes = fetched.bytes, "archive downloaded");

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let extract_tracker = Arc::clone(tracker);
        let extract_options = ExtractOptions::default().on_progress(Arc::new(
            move |p: &packsync_archive::Progress| extract_tracker.file_extracted(p.files_total),
        ));
        let target = target.to_path_buf();
        tokio::task::spawn_blocking(move || {
            // Keeps the download alive until extraction is done.
            let _download = download;
            let file =
                File::open(&fetched.path).map_err(|e| SyncError::apply_io(&fetched.path, e))?;
            extract_to_workspace(file, &target, &extract_options)
                .map_err(|e| extraction_error(&target, e))
        })
        .await
        .map_err(|e| SyncError::ArchiveCorrupt(format!("extraction task failed: {e}")))?
    }
}

fn extraction_error(target: &Path, error: packsync_archive::Error) -> SyncError {
    use packsync_archive::Error;
    match error {
        Error::ZipSlip { entry } => SyncError::PathTraversalRejected(entry),
        Error::InvalidPath { entry } => {
            SyncError::ArchiveCorrupt(format!("unusable entry name '{entry}'"))
        }
        conflict @ Error::Conflict { .. } => SyncError::ArchiveCorrupt(conflict.to_string()),
        Error::Corrupted(message) => SyncError::ArchiveCorrupt(message),
        other @ (Error::ExtractionFailed { .. }
        | Error::DirectoryCreationFailed { .. }
        | Error::Workspace(_)) => SyncError::apply_io(target, other),
    }
}
