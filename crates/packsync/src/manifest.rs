//! The remote manifest: which files a pack consists of, with their SHA-256
//! and size.
//!
//! Wire format is a JSON array of `{"path", "hash", "size"}` objects. Paths
//! are relative, `/`-separated and checked with [`validate_relative_path`]
//! before anything else sees them.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};

use packsync_fetch::{Fetcher, HttpClient};
use packsync_verify::ContentHash;
use serde::Deserialize;

use crate::config::SyncOptions;
use crate::error::SyncError;
use crate::source::BaseUrl;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: String,
    pub hash: ContentHash,
    pub size: u64,
}

/// Manifest entries keyed by path, iterated in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

#[derive(Deserialize)]
struct RawEntry {
    path: String,
    hash: String,
    size: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("malformed manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate entry '{0}'")]
    DuplicatePath(String),

    #[error("entry '{path}' has invalid hash '{value}'")]
    InvalidHash { path: String, value: String },

    #[error(transparent)]
    UnsafePath(#[from] PathError),

    #[error("entry '{path}' is both a file and the parent of '{child}'")]
    Conflict { path: String, child: String },
}

impl From<ManifestError> for SyncError {
    fn from(error: ManifestError) -> Self {
        match error {
            ManifestError::UnsafePath(e) => SyncError::PathTraversalRejected(e.path),
            other => SyncError::ManifestUnavailable(other.to_string()),
        }
    }
}

/// A pack path that could resolve outside the target or is not portable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsafe path '{path}': {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: &'static str,
}

/// Accept only relative, `/`-separated paths whose segments are all plain
/// names.
pub fn validate_relative_path(path: &str) -> Result<(), PathError> {
    let reject = |reason| {
        Err(PathError {
            path: path.to_string(),
            reason,
        })
    };
    if path.is_empty() {
        return reject("empty path");
    }
    if path.contains('\0') {
        return reject("contains NUL");
    }
    if path.contains('\\') {
        return reject("contains a backslash");
    }
    if path.starts_with('/') {
        return reject("absolute path");
    }
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return reject("drive prefix");
    }
    for segment in path.split('/') {
        match segment {
            "" => return reject("empty segment"),
            "." | ".." => return reject("dot segment"),
            _ => {}
        }
    }
    Ok(())
}

/// Native path of a validated pack path under `root`.
pub(crate) fn resolve_under(root: &Path, relative: &str) -> PathBuf {
    relative.split('/').fold(root.to_path_buf(), |path, segment| path.join(segment))
}

impl Manifest {
    /// Parse the JSON wire format.
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let raw: Vec<RawEntry> = serde_json::from_slice(bytes)?;
        let entries = raw
            .into_iter()
            .map(|raw| {
                let hash = raw.hash.parse().map_err(|_| ManifestError::InvalidHash {
                    path: raw.path.clone(),
                    value: raw.hash.clone(),
                })?;
                Ok(ManifestEntry {
                    path: raw.path,
                    hash,
                    size: raw.size,
                })
            })
            .collect::<Result<Vec<_>, ManifestError>>()?;
        Self::from_entries(entries)
    }

    pub fn from_entries(
        entries: impl IntoIterator<Item = ManifestEntry>,
    ) -> Result<Self, ManifestError> {
        let mut map = BTreeMap::new();
        for entry in entries {
            validate_relative_path(&entry.path)?;
            match map.entry(entry.path.clone()) {
                Entry::Occupied(_) => return Err(ManifestError::DuplicatePath(entry.path)),
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
            }
        }

        for path in map.keys() {
            for (index, _) in path.match_indices('/') {
                let parent = &path[..index];
                if map.contains_key(parent) {
                    return Err(ManifestError::Conflict {
                        path: parent.to_string(),
                        child: path.clone(),
                    });
                }
            }
        }

        Ok(Self { entries: map })
    }

    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.values()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }
}

/// Downloads and parses a source's manifest.
pub struct ManifestFetcher<'a, C: HttpClient> {
    fetcher: &'a Fetcher<C>,
    options: &'a SyncOptions,
}

impl<'a, C: HttpClient> ManifestFetcher<'a, C> {
    pub fn new(fetcher: &'a Fetcher<C>, options: &'a SyncOptions) -> Self {
        Self { fetcher, options }
    }

    /// Transport and parse failures surface as `ManifestUnavailable`; an
    /// unsafe entry path as `PathTraversalRejected`.
    pub async fn fetch(&self, base: &BaseUrl) -> Result<Manifest, SyncError> {
        let url = base.join(&self.options.manifest_path);
        let options = self
            .options
            .fetch_options()
            .max_bytes(Some(self.options.max_manifest_bytes));
        let body = self
            .fetcher
            .fetch_bytes(&url, &options)
            .await
            .map_err(|e| SyncError::ManifestUnavailable(e.to_string()))?;
        let manifest = Manifest::parse(&body)?;
        tracing::debug!(
            url = %url,
            entries = manifest.len(),
            bytes = manifest.total_bytes(),
            "manifest fetched"
        );
        Ok(manifest)
    }
}
