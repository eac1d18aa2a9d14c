//! Orchestration of one sync run.
//!
//! ```text
//! recover ─▶ fetch manifest ∥ scan target ─▶ plan ─▶ transfer ─▶ apply
//!                 │ fails                                │ too many failures
//!                 └──────────────▶ archive download + extract ─▶ apply
//! ```

use std::path::Path;
use std::sync::Arc;

use packsync_fetch::{Fetcher, HttpClient};
use packsync_fs::{Recovery, Workspace, recover};

use crate::apply::Applier;
use crate::archive::ArchiveFetcher;
use crate::cancel::CancellationToken;
use crate::config::SyncOptions;
use crate::error::{ConfigError, SyncError, SyncResult};
use crate::hooks::{SyncHook, run_post_apply, run_post_sync};
use crate::manifest::{Manifest, ManifestFetcher};
use crate::plan::{SyncPlan, plan};
use crate::progress::{ProgressHandle, ProgressSink, ProgressTracker, SyncState, Terminal};
use crate::scan::{LocalState, scan};
use crate::source::{BaseUrl, SourceDescriptor};
use crate::transfer::ContentFetcher;

/// Runs syncs against one HTTP client with fixed options.
pub struct Dispatcher<C: HttpClient> {
    fetcher: Fetcher<C>,
    options: SyncOptions,
    progress: ProgressHandle,
    hooks: Vec<Box<dyn SyncHook>>,
}

/// Why the run left manifest mode.
enum Fallback {
    Manifest(SyncError),
    Transfers(SyncError),
}

impl<C: HttpClient> Dispatcher<C> {
    pub fn new(client: C, options: SyncOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self {
            fetcher: Fetcher::new(client),
            options,
            progress: ProgressHandle::default(),
            hooks: Vec::new(),
        })
    }

    #[must_use]
    pub fn hook(mut self, hook: impl SyncHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Snapshot access to the current (or last) run.
    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    /// Bring `target` in line with `source`.
    ///
    /// Never panics on remote or local failures; every outcome is a
    /// [`SyncResult`]. On any `Failure`, `target` holds exactly the tree it
    /// held before the run.
    pub async fn run_sync(
        &self,
        target: &Path,
        source: &SourceDescriptor,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> SyncResult {
        let tracker = Arc::new(ProgressTracker::new(
            &self.progress,
            sink,
            self.options.progress_interval(),
        ));
        tracing::info!(source = %source.name, dest = %target.display(), "sync started");

        let result = match self.execute(target, source, &tracker, cancel).await {
            Ok(result) => result,
            Err(e) => SyncResult::Failure(e),
        };

        let terminal = match &result {
            SyncResult::Failure(SyncError::Cancelled) => Terminal::Cancelled,
            SyncResult::Failure(_) => Terminal::Failed,
            SyncResult::Success | SyncResult::SuccessWithWarnings(_) => Terminal::Succeeded,
        };
        tracker.finish(terminal);
        match &result {
            SyncResult::Success => tracing::info!(source = %source.name, "sync succeeded"),
            SyncResult::SuccessWithWarnings(skipped) => {
                tracing::warn!(
                    source = %source.name,
                    skipped = skipped.len(),
                    "sync succeeded with skipped files"
                )
            }
            SyncResult::Failure(e) => {
                tracing::error!(source = %source.name, error = %e, "sync failed")
            }
        }

        run_post_sync(&self.hooks, target, &result);
        result
    }

    /// Compute what a sync would do without touching `target`.
    pub async fn preview(
        &self,
        target: &Path,
        source: &SourceDescriptor,
    ) -> Result<SyncPlan, SyncError> {
        let base = source.base()?;
        if !source.has_manifest {
            return Err(SyncError::ManifestUnavailable(format!(
                "source '{}' serves only an archive",
                source.name
            )));
        }
        let manifests = ManifestFetcher::new(&self.fetcher, &self.options);
        let (manifest, local) = tokio::join!(manifests.fetch(&base), scan(target.to_path_buf()));
        Ok(plan(&manifest?, &local?))
    }

    async fn execute(
        &self,
        target: &Path,
        source: &SourceDescriptor,
        tracker: &Arc<ProgressTracker>,
        cancel: &CancellationToken,
    ) -> Result<SyncResult, SyncError> {
        let base = source.base()?;
        tracker.set_state(SyncState::FetchingRemoteState);

        let recovery = {
            let owned = target.to_path_buf();
            tokio::task::spawn_blocking(move || recover(owned))
                .await
                .map_err(|e| SyncError::apply_io(target, e))?
                .map_err(|e| SyncError::apply_io(target, e))?
        };
        if recovery != Recovery::Clean {
            tracing::warn!(
                dest = %target.display(),
                ?recovery,
                "recovered from an interrupted swap"
            );
        }
        check(cancel)?;

        let fallback = if source.has_manifest {
            match self.fetch_remote_state(target, &base).await {
                Ok((manifest, local)) => {
                    check(cancel)?;
                    match self
                        .sync_manifest(target, &base, manifest, local, tracker, cancel)
                        .await?
                    {
                        None => return Ok(SyncResult::Success),
                        Some(Ok(result)) => return Ok(result),
                        Some(Err(reason)) => Some(Fallback::Transfers(reason)),
                    }
                }
                Err(e) => Some(Fallback::Manifest(e)),
            }
        } else {
            None
        };

        if !source.has_archive {
            return Err(match fallback {
                Some(Fallback::Manifest(e) | Fallback::Transfers(e)) => e,
                None => SyncError::SourceUnusable {
                    name: source.name.clone(),
                    reason: "offers neither a manifest nor an archive".to_string(),
                },
            });
        }
        match &fallback {
            Some(Fallback::Manifest(e)) => {
                tracing::warn!(error = %e, "manifest mode unavailable, using archive")
            }
            Some(Fallback::Transfers(e)) => {
                tracing::warn!(error = %e, "too many transfer failures, using archive")
            }
            None => {}
        }
        check(cancel)?;

        tracker.set_state(SyncState::Transferring);
        let extraction = ArchiveFetcher::new(&self.fetcher, &self.options)
            .fetch(&base, target, tracker, cancel)
            .await?;
        check(cancel)?;

        tracker.set_state(SyncState::Applying);
        Applier::apply_archive(extraction, target, cancel).await?;
        run_post_apply(&self.hooks, target);
        Ok(SyncResult::Success)
    }

    async fn fetch_remote_state(
        &self,
        target: &Path,
        base: &BaseUrl,
    ) -> Result<(Manifest, LocalState), SyncError> {
        let manifests = ManifestFetcher::new(&self.fetcher, &self.options);
        let (manifest, local) = tokio::join!(manifests.fetch(base), scan(target.to_path_buf()));
        Ok((manifest?, local?))
    }

    /// Plan, transfer and apply in manifest mode.
    ///
    /// `None` means there was nothing to do. `Some(Err)` hands the run to the
    /// archive fallback; fatal errors come back as the outer `Err`.
    async fn sync_manifest(
        &self,
        target: &Path,
        base: &BaseUrl,
        manifest: Manifest,
        local: LocalState,
        tracker: &Arc<ProgressTracker>,
        cancel: &CancellationToken,
    ) -> Result<Option<Result<SyncResult, SyncError>>, SyncError> {
        tracker.set_state(SyncState::Planning);
        let plan = plan(&manifest, &local);
        tracing::info!(
            add = plan.to_add.len(),
            update = plan.to_update.len(),
            delete = plan.to_delete.len(),
            bytes = plan.total_bytes,
            "sync planned"
        );
        if plan.is_empty() {
            return Ok(None);
        }

        tracker.add_totals(plan.transfer_count() as u64, plan.total_bytes);
        tracker.set_state(SyncState::Transferring);
        let staging = Workspace::adjacent(target, "staging")
            .map_err(|e| SyncError::apply_io(target, e))?;
        let report = ContentFetcher::new(&self.fetcher, &self.options)
            .fetch_all(base, &plan, &manifest, &staging, tracker, cancel)
            .await?;
        check(cancel)?;

        if report.exceeds(self.options.fallback_threshold) {
            return Ok(Some(Err(SyncError::TooManyFailures {
                failed: report.failures.len(),
                attempted: report.attempted(),
            })));
        }

        tracker.set_state(SyncState::Applying);
        Applier::apply_plan(staging, target, &local, &plan, &report.staged, cancel).await?;
        run_post_apply(&self.hooks, target);

        Ok(Some(Ok(if report.failures.is_empty() {
            SyncResult::Success
        } else {
            SyncResult::SuccessWithWarnings(report.failed_paths())
        })))
    }
}

fn check(cancel: &CancellationToken) -> Result<(), SyncError> {
    if cancel.is_cancelled() {
        Err(SyncError::Cancelled)
    } else {
        Ok(())
    }
}
