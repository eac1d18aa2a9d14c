use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use packsync_verify::{ContentHash, hash_file};
use walkdir::WalkDir;

use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileRecord {
    pub path: String,
    pub hash: ContentHash,
    pub size: u64,
}

/// Regular files currently under a target, keyed by `/`-separated relative
/// path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalState {
    records: BTreeMap<String, LocalFileRecord>,
}

impl LocalState {
    pub fn from_records(records: impl IntoIterator<Item = LocalFileRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.path.clone(), r)).collect(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&LocalFileRecord> {
        self.records.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.records.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocalFileRecord> {
        self.records.values()
    }
}

/// Hash every regular file under `root`.
///
/// A missing root is an empty state. Symlinks are neither followed nor
/// recorded, and names that are not valid UTF-8 are skipped with a warning.
pub fn scan_local_state(root: &Path) -> Result<LocalState, SyncError> {
    match std::fs::symlink_metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(SyncError::ScanIo {
                path: root.to_path_buf(),
                message: "target exists and is not a directory".to_string(),
            });
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LocalState::default()),
        Err(e) => return Err(scan_error(root, e)),
    }

    let mut records = BTreeMap::new();
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            // Removed while we were walking.
            Err(e) if e.io_error().is_some_and(|io| io.kind() == io::ErrorKind::NotFound) => {
                continue;
            }
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                return Err(SyncError::ScanIo {
                    path,
                    message: e.to_string(),
                });
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(relative) = relative_key(root, entry.path()) else {
            tracing::warn!(path = %entry.path().display(), "skipping file with a non UTF-8 name");
            continue;
        };
        let (hash, size) = hash_file(entry.path()).map_err(|e| SyncError::ScanIo {
            path: entry.path().to_path_buf(),
            message: e.to_string(),
        })?;
        records.insert(relative.clone(), LocalFileRecord {
            path: relative,
            hash,
            size,
        });
    }

    tracing::debug!(root = %root.display(), files = records.len(), "local state scanned");
    Ok(LocalState { records })
}

/// [`scan_local_state`] on the blocking pool.
pub async fn scan(root: PathBuf) -> Result<LocalState, SyncError> {
    let path = root.clone();
    tokio::task::spawn_blocking(move || scan_local_state(&root))
        .await
        .map_err(|e| SyncError::ScanIo {
            path,
            message: e.to_string(),
        })?
}

pub(crate) fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => segments.push(name.to_str()?),
            _ => return None,
        }
    }
    Some(segments.join("/"))
}

fn scan_error(path: &Path, error: io::Error) -> SyncError {
    SyncError::ScanIo {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}
