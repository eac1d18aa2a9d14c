use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SyncError;

/// A remote location serving a pack.
///
/// Sources written for older tooling use `hasDirHash` for the manifest flag;
/// it is accepted as an alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    pub name: String,
    pub base_url: String,
    #[serde(default, alias = "hasDirHash")]
    pub has_manifest: bool,
    #[serde(default)]
    pub has_archive: bool,
}

impl SourceDescriptor {
    /// A manifest-only source.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            has_manifest: true,
            has_archive: false,
        }
    }

    #[must_use]
    pub fn with_manifest(mut self, has_manifest: bool) -> Self {
        self.has_manifest = has_manifest;
        self
    }

    #[must_use]
    pub fn with_archive(mut self, has_archive: bool) -> Self {
        self.has_archive = has_archive;
        self
    }

    pub fn is_usable(&self) -> bool {
        self.has_manifest || self.has_archive
    }

    /// Parse and check the base URL. Fails with `SourceUnusable` when the
    /// source advertises nothing or the URL cannot anchor relative paths.
    pub fn base(&self) -> Result<BaseUrl, SyncError> {
        let unusable = |reason: String| SyncError::SourceUnusable {
            name: self.name.clone(),
            reason,
        };
        if !self.is_usable() {
            return Err(unusable("offers neither a manifest nor an archive".to_string()));
        }
        let url = Url::parse(&self.base_url)
            .map_err(|e| unusable(format!("invalid base URL '{}': {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(unusable(format!("unsupported scheme '{}'", url.scheme())));
        }
        if url.cannot_be_a_base() {
            return Err(unusable(format!("'{}' cannot be a base URL", self.base_url)));
        }
        Ok(BaseUrl(url))
    }
}

/// A validated source base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// URL of `relative` (a `/`-separated pack path) under this base. Each
    /// segment is percent-encoded, so names with spaces or `#` stay intact.
    pub fn join(&self, relative: &str) -> String {
        let mut url = self.0.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(relative.split('/'));
        }
        url.to_string()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}
