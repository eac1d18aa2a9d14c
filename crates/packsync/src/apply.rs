//! Turning a staged result into the live tree.
//!
//! Both modes end in a single directory swap; see `packsync_fs::replace_dir`
//! for the crash guarantees.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use packsync_archive::WorkspaceExtraction;
use packsync_fs::{HardlinkOrCopyOptions, Workspace, hardlink_or_copy};
use walkdir::WalkDir;

use crate::cancel::CancellationToken;
use crate::error::SyncError;
use crate::manifest::resolve_under;
use crate::plan::SyncPlan;
use crate::scan::{LocalState, relative_key};

pub struct Applier;

impl Applier {
    /// Complete the staging tree of a manifest-mode run and swap it in.
    ///
    /// `staging` already holds every verified download at its pack path.
    /// Local files that are neither deleted nor replaced (unchanged ones and
    /// updates whose transfer failed) are hard-linked in from `target`,
    /// falling back to a copy. Entries the scan never records (symlinks,
    /// special files, non UTF-8 names) are not carried; each is logged as
    /// dropped.
    pub(crate) async fn apply_plan(
        staging: Workspace,
        target: &Path,
        local: &LocalState,
        plan: &SyncPlan,
        staged: &BTreeMap<String, PathBuf>,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        let carried: Vec<String> = local
            .iter()
            .map(|record| record.path.clone())
            .filter(|path| !plan.to_delete.contains(path) && !staged.contains_key(path))
            .collect();
        let local_paths: BTreeSet<String> =
            local.iter().map(|record| record.path.clone()).collect();
        let owned = target.to_path_buf();
        let cancel = cancel.clone();

        blocking(target, move || {
            warn_uncarried(&owned, &local_paths);
            for path in &carried {
                let src = resolve_under(&owned, path);
                let dest = resolve_under(staging.path(), path);
                hardlink_or_copy(&src, &dest, HardlinkOrCopyOptions::new())
                    .map_err(|e| SyncError::apply_io(&src, e))?;
            }
            prune_empty_dirs(staging.path());

            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            staging.commit().map_err(|e| SyncError::apply_io(&owned, e))?;
            tracing::info!(dest = %owned.display(), carried = carried.len(), "new tree applied");
            Ok(())
        })
        .await
    }

    /// Swap an extracted archive in as the whole new tree.
    pub(crate) async fn apply_archive(
        extraction: WorkspaceExtraction,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        let owned = target.to_path_buf();
        let cancel = cancel.clone();
        blocking(target, move || {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let report = extraction.commit().map_err(|e| SyncError::apply_io(&owned, e))?;
            tracing::info!(
                dest = %owned.display(),
                files = report.file_count(),
                bytes = report.total_bytes,
                "archive applied"
            );
            Ok(())
        })
        .await
    }
}

async fn blocking(
    target: &Path,
    work: impl FnOnce() -> Result<(), SyncError> + Send + 'static,
) -> Result<(), SyncError> {
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SyncError::apply_io(target, e))?
}

/// Logs every non-directory entry of `root` that is not in `scanned`.
fn warn_uncarried(root: &Path, scanned: &BTreeSet<String>) -> usize {
    let mut dropped = 0;
    for entry in WalkDir::new(root).min_depth(1).follow_links(false).into_iter().flatten() {
        if entry.file_type().is_dir() {
            continue;
        }
        let kept = relative_key(root, entry.path()).is_some_and(|key| scanned.contains(&key));
        if !kept {
            tracing::warn!(
                path = %entry.path().display(),
                "dropping entry the scan does not track"
            );
            dropped += 1;
        }
    }
    dropped
}

/// Downloads that failed can leave their parent directories behind.
fn prune_empty_dirs(root: &Path) {
    for entry in WalkDir::new(root).min_depth(1).contents_first(true).into_iter().flatten() {
        if entry.file_type().is_dir() {
            // Non-empty directories stay.
            let _ = std::fs::remove_dir(entry.path());
        }
    }
}
