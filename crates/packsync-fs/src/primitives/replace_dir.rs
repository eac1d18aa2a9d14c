use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Marker shared by every sibling path packsync creates next to a target.
pub const SIBLING_TAG: &str = "packsync";

const BACKUP_LABEL: &str = "old";

#[derive(Clone, Copy, Debug)]
pub struct ReplaceDirOptions {
    retry_count: u32,
    retry_delay: Duration,
}

impl Default for ReplaceDirOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplaceDirOptions {
    pub fn new() -> Self {
        Self {
            retry_count: 5,
            retry_delay: Duration::from_millis(100),
        }
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = count.max(1);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Outcome of [`recover`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recovery {
    /// No interrupted swap was found.
    Clean,
    /// The target was missing and the backup was moved back into place.
    RestoredBackup,
    /// The swap had completed; the leftover backup was removed.
    RemovedBackup,
}

/// Path of a hidden sibling of `target`: `<parent>/.<name>.packsync-<label>`.
pub fn sibling_path(target: &Path, label: &str) -> Result<PathBuf> {
    let name = target
        .file_name()
        .ok_or_else(|| Error::InvalidPath(target.to_path_buf()))?;
    let parent = target.parent().unwrap_or(Path::new(""));
    Ok(parent.join(format!(".{}.{SIBLING_TAG}-{label}", name.to_string_lossy())))
}

/// Deterministic location the current tree is parked at during a swap.
pub fn backup_path(target: &Path) -> Result<PathBuf> {
    sibling_path(target, BACKUP_LABEL)
}

/// Replace `dest` with the directory at `src`.
///
/// The old tree is renamed to [`backup_path`] first, then `src` is renamed
/// into place and the backup removed. At every instant `dest` is either the
/// old complete tree, the new complete tree, or absent with the old tree
/// parked at the backup path, which [`recover`] puts back.
pub fn replace_dir(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: ReplaceDirOptions,
) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();
    let backup = backup_path(dest)?;

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    settle_backup(dest, &backup)?;

    let had_old = std::fs::symlink_metadata(dest).is_ok();
    if had_old {
        rename_with_retry(dest, &backup, options)?;
    }

    if let Err(e) = rename_with_retry(src, dest, options) {
        if had_old && let Err(restore) = std::fs::rename(&backup, dest) {
            tracing::error!(
                backup = %backup.display(),
                error = %restore,
                "failed to restore previous tree after aborted swap"
            );
        }
        return Err(e);
    }

    if had_old && let Err(e) = std::fs::remove_dir_all(&backup) {
        // The new tree is live; the next recover() pass removes the leftover.
        tracing::warn!(backup = %backup.display(), error = %e, "failed to remove previous tree");
    }

    Ok(())
}

/// Repair the state left behind by an interrupted [`replace_dir`] and sweep
/// stale staging siblings of `target`.
pub fn recover(target: impl AsRef<Path>) -> Result<Recovery> {
    let target = target.as_ref();
    let backup = backup_path(target)?;

    let recovery = settle_backup(target, &backup)?;
    sweep_staging(target)?;
    Ok(recovery)
}

fn settle_backup(target: &Path, backup: &Path) -> Result<Recovery> {
    if !backup.exists() {
        return Ok(Recovery::Clean);
    }
    if std::fs::symlink_metadata(target).is_ok() {
        std::fs::remove_dir_all(backup).map_err(|e| Error::Write {
            path: backup.to_path_buf(),
            source: e,
        })?;
        Ok(Recovery::RemovedBackup)
    } else {
        std::fs::rename(backup, target).map_err(|e| Error::ReplaceDir {
            path: target.to_path_buf(),
            source: e,
        })?;
        Ok(Recovery::RestoredBackup)
    }
}

fn sweep_staging(target: &Path) -> Result<()> {
    let Some(name) = target.file_name() else {
        return Err(Error::InvalidPath(target.to_path_buf()));
    };
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let prefix = format!(".{}.{SIBLING_TAG}-", name.to_string_lossy());

    let entries = match std::fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(Error::Read {
                path: parent.to_path_buf(),
                source: e,
            });
        }
    };

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        if !file_name.to_string_lossy().starts_with(&prefix) {
            continue;
        }
        let path = entry.path();
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match removed {
            Ok(()) => tracing::debug!(path = %path.display(), "removed stale staging entry"),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to remove stale staging entry"
            ),
        }
    }
    Ok(())
}

#[cfg(not(windows))]
fn rename_with_retry(src: &Path, dest: &Path, _options: ReplaceDirOptions) -> Result<()> {
    std::fs::rename(src, dest).map_err(|e| Error::ReplaceDir {
        path: dest.to_path_buf(),
        source: e,
    })
}

// Scanners and indexers briefly hold handles open on Windows.
#[cfg(windows)]
fn rename_with_retry(src: &Path, dest: &Path, options: ReplaceDirOptions) -> Result<()> {
    let mut attempts = 0;
    loop {
        match std::fs::rename(src, dest) {
            Ok(()) => return Ok(()),
            Err(e) => {
                attempts += 1;
                if attempts >= options.retry_count {
                    return Err(Error::ReplaceDir {
                        path: dest.to_path_buf(),
                        source: e,
                    });
                }
                std::thread::sleep(options.retry_delay * attempts);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tree(root: &Path, files: &[(&str, &str)]) {
        for (name, content) in files {
            let path = root.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
    }

    #[test]
    fn test_sibling_path() {
        let path = sibling_path(Path::new("/packs/SyncedPack"), "new").unwrap();
        assert_eq!(path, Path::new("/packs/.SyncedPack.packsync-new"));
        assert!(sibling_path(Path::new("/"), "new").is_err());
    }

    #[test]
    fn test_replace_dir_into_missing_dest() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("nested/dest");
        tree(&src, &[("file.txt", "data")]);

        replace_dir(&src, &dest, ReplaceDirOptions::new()).unwrap();
        assert_eq!(std::fs::read_to_string(dest.join("file.txt")).unwrap(), "data");
        assert!(!src.exists());
    }

    #[test]
    fn test_replace_dir_swaps_existing_tree() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        tree(&dest, &[("old.txt", "old"), ("sub/keep.txt", "old")]);
        tree(&src, &[("new.txt", "new")]);

        replace_dir(&src, &dest, ReplaceDirOptions::new()).unwrap();

        assert!(dest.join("new.txt").exists());
        assert!(!dest.join("old.txt").exists());
        assert!(!dest.join("sub").exists());
        assert!(!backup_path(&dest).unwrap().exists());
    }

    #[test]
    fn test_replace_dir_missing_src_keeps_old_tree() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("dest");
        tree(&dest, &[("old.txt", "old")]);

        let result = replace_dir(dir.path().join("missing"), &dest, ReplaceDirOptions::new());

        assert!(matches!(result, Err(Error::ReplaceDir { .. })));
        assert_eq!(std::fs::read_to_string(dest.join("old.txt")).unwrap(), "old");
        assert!(!backup_path(&dest).unwrap().exists());
    }

    #[test]
    fn test_recover_restores_backup_when_target_missing() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("dest");
        let backup = backup_path(&dest).unwrap();
        tree(&backup, &[("old.txt", "old")]);

        assert_eq!(recover(&dest).unwrap(), Recovery::RestoredBackup);
        assert_eq!(std::fs::read_to_string(dest.join("old.txt")).unwrap(), "old");
        assert!(!backup.exists());
    }

    #[test]
    fn test_recover_drops_backup_when_swap_completed() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("dest");
        let backup = backup_path(&dest).unwrap();
        tree(&backup, &[("old.txt", "old")]);
        tree(&dest, &[("new.txt", "new")]);

        assert_eq!(recover(&dest).unwrap(), Recovery::RemovedBackup);
        assert!(dest.join("new.txt").exists());
        assert!(!backup.exists());
    }

    #[test]
    fn test_recover_sweeps_staging_siblings_only() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("dest");
        tree(&dest, &[("a.txt", "a")]);
        let stale = sibling_path(&dest, "staging-1234").unwrap();
        tree(&stale, &[("partial.bin", "x")]);
        let unrelated = dir.path().join(".other.packsync-new");
        std::fs::create_dir_all(&unrelated).unwrap();

        assert_eq!(recover(&dest).unwrap(), Recovery::Clean);
        assert!(!stale.exists());
        assert!(unrelated.exists());
        assert!(dest.join("a.txt").exists());
    }

    #[test]
    fn test_recover_missing_parent_is_clean() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("not/yet/here");
        assert_eq!(recover(&dest).unwrap(), Recovery::Clean);
    }
}
