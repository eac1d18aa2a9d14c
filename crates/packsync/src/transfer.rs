//! Per-file downloads of a plan into the next tree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use packsync_fetch::{BatchJob, BatchOutcome, FetchError, Fetcher, HttpClient, Progress};
use packsync_fs::Workspace;

use crate::cancel::CancellationToken;
use crate::config::SyncOptions;
use crate::error::SyncError;
use crate::manifest::{Manifest, resolve_under};
use crate::plan::SyncPlan;
use crate::progress::ProgressTracker;
use crate::source::BaseUrl;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub error: SyncError,
}

#[derive(Debug, Default)]
pub struct TransferReport {
    /// Verified files, by pack path, at their final location in the staging
    /// tree.
    pub staged: BTreeMap<String, PathBuf>,
    /// Sorted by path.
    pub failures: Vec<FileFailure>,
    /// Transfers never started because the run was cancelled.
    pub cancelled: usize,
}

impl TransferReport {
    /// Transfers that ran to success or failure.
    pub fn attempted(&self) -> usize {
        self.staged.len() + self.failures.len()
    }

    pub fn failure_ratio(&self) -> f64 {
        match self.attempted() {
            0 => 0.0,
            attempted => self.failures.len() as f64 / attempted as f64,
        }
    }

    /// Strictly above `threshold`.
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.failure_ratio() > threshold
    }

    pub fn failed_paths(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.path.clone()).collect()
    }
}

/// Downloads every add and update of a plan, verifying each against its
/// manifest hash.
pub struct ContentFetcher<'a, C: HttpClient> {
    fetcher: &'a Fetcher<C>,
    options: &'a SyncOptions,
}

impl<'a, C: HttpClient> ContentFetcher<'a, C> {
    pub fn new(fetcher: &'a Fetcher<C>, options: &'a SyncOptions) -> Self {
        Self { fetcher, options }
    }

    /// Files land at their pack path under `staging`. A failed file leaves
    /// nothing behind and never stops the others.
    ///
    /// Bodies stream into a separate download directory under numbered
    /// names and are moved into `staging` once verified, so no temporary
    /// file ever shares a name a manifest can address.
    pub(crate) async fn fetch_all(
        &self,
        base: &BaseUrl,
        plan: &SyncPlan,
        manifest: &Manifest,
        staging: &Workspace,
        tracker: &Arc<ProgressTracker>,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, SyncError> {
        let downloads = Workspace::adjacent(staging.destination(), "download")
            .map_err(|e| SyncError::apply_io(staging.destination(), e))?;
        let jobs: Vec<_> = plan
            .transfers()
            .filter_map(|path| manifest.get(path))
            .enumerate()
            .map(|(index, entry)| {
                let tracker = Arc::clone(tracker);
                let key = entry.path.clone();
                let options = self
                    .options
                    .fetch_options()
                    .checksum(Some(entry.hash))
                    .on_progress(Arc::new(move |p: &Progress| {
                        tracker.record_bytes(&key, p.bytes_downloaded, None)
                    }));
                BatchJob {
                    key: entry.path.clone(),
                    url: base.join(&entry.path),
                    destination: downloads.path().join(format!("{index:06}")),
                    options,
                }
            })
            .collect();

        let results = self
            .fetcher
            .fetch_batch_with(
                jobs,
                &self.options.batch_options(),
                || !cancel.is_cancelled(),
                |_, outcome| {
                    if !matches!(outcome, BatchOutcome::Skipped) {
                        tracker.file_done();
                    }
                },
            )
            .await;

        let mut report = TransferReport::default();
        for (path, outcome) in results {
            match outcome {
                BatchOutcome::Fetched(fetched) => {
                    let destination = resolve_under(staging.path(), &path);
                    move_into_place(&fetched.path, &destination)
                        .await
                        .map_err(|e| SyncError::apply_io(&destination, e))?;
                    report.staged.insert(path, destination);
                }
                BatchOutcome::Failed(e) => {
                    tracing::warn!(path = %path, error = %e, "file transfer failed");
                    let error = transfer_error(&path, &e);
                    report.failures.push(FileFailure { path, error });
                }
                BatchOutcome::Skipped => report.cancelled += 1,
            }
        }
        report.failures.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::debug!(
            staged = report.staged.len(),
            failed = report.failures.len(),
            cancelled = report.cancelled,
            "transfers finished"
        );
        Ok(report)
    }
}

async fn move_into_place(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::rename(from, to).await
}

fn transfer_error(path: &str, error: &FetchError) -> SyncError {
    match error.root() {
        FetchError::ChecksumMismatch { expected, actual } => SyncError::HashMismatch {
            path: path.to_string(),
            expected: *expected,
            actual: *actual,
        },
        _ => SyncError::Transfer {
            path: path.to_string(),
            message: error.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use packsync_verify::ContentHash;

    use super::*;

    fn failure(path: &str) -> FileFailure {
        FileFailure {
            path: path.to_string(),
            error: SyncError::Transfer {
                path: path.to_string(),
                message: "HTTP 404".to_string(),
            },
        }
    }

    #[test]
    fn test_ratio_is_strictly_above_threshold() {
        let mut report = TransferReport::default();
        assert_eq!(report.failure_ratio(), 0.0);
        assert!(!report.exceeds(0.0));

        report.staged.insert("a".into(), PathBuf::from("a"));
        report.failures.push(failure("b"));
        assert_eq!(report.failure_ratio(), 0.5);
        assert!(!report.exceeds(0.5));
        assert!(report.exceeds(0.49));
    }

    #[test]
    fn test_cancelled_jobs_are_not_attempts() {
        let report = TransferReport {
            cancelled: 3,
            failures: vec![failure("a")],
            ..TransferReport::default()
        };
        assert_eq!(report.attempted(), 1);
        assert_eq!(report.failed_paths(), ["a"]);
    }

    #[test]
    fn test_checksum_mismatch_maps_to_hash_mismatch() {
        let expected = ContentHash::from_bytes([1; 32]);
        let actual = ContentHash::from_bytes([2; 32]);
        let error = transfer_error("x.png", &FetchError::ChecksumMismatch { expected, actual });
        assert_eq!(error, SyncError::HashMismatch {
            path: "x.png".to_string(),
            expected,
            actual,
        });

        let error = transfer_error("x.png", &FetchError::Network("reset".into()));
        assert!(matches!(error, SyncError::Transfer { .. }));
    }
}
