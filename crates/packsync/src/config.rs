use std::time::Duration;

use packsync_fetch::{BatchOptions, FetchOptions, Timeouts};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::manifest::validate_relative_path;

/// Tunables of a sync run.
///
/// Deserializes from camelCase JSON; every field is optional and falls back
/// to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    /// Manifest location relative to the source base URL.
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    /// Whole-pack zip location relative to the source base URL.
    #[serde(default = "default_archive_path")]
    pub archive_path: String,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Share of failed per-file transfers above which the run abandons
    /// manifest mode for the archive. Compared with `>`.
    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold: f64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,

    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Largest manifest body accepted, in bytes.
    #[serde(default = "default_max_manifest_bytes")]
    pub max_manifest_bytes: u64,

    /// Minimum gap between two throttled progress emissions.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

fn default_manifest_path() -> String {
    "manifest.json".to_string()
}
fn default_archive_path() -> String {
    "pack.zip".to_string()
}
fn default_max_concurrent() -> usize {
    4
}
fn default_fallback_threshold() -> f64 {
    0.5
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    200
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_response_timeout_secs() -> u64 {
    30
}
fn default_read_timeout_secs() -> u64 {
    30
}
fn default_max_manifest_bytes() -> u64 {
    16 * 1024 * 1024
}
fn default_progress_interval_ms() -> u64 {
    100
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            manifest_path: default_manifest_path(),
            archive_path: default_archive_path(),
            max_concurrent: default_max_concurrent(),
            fallback_threshold: default_fallback_threshold(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            response_timeout_secs: default_response_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            max_manifest_bytes: default_max_manifest_bytes(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

impl SyncOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, path) in [
            ("manifestPath", &self.manifest_path),
            ("archivePath", &self.archive_path),
        ] {
            validate_relative_path(path).map_err(|e| ConfigError::InvalidOption {
                field,
                reason: e.to_string(),
            })?;
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::InvalidOption {
                field: "maxConcurrent",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.fallback_threshold) {
            return Err(ConfigError::InvalidOption {
                field: "fallbackThreshold",
                reason: format!("{} is outside 0.0..=1.0", self.fallback_threshold),
            });
        }
        if self.max_manifest_bytes == 0 {
            return Err(ConfigError::InvalidOption {
                field: "maxManifestBytes",
                reason: "must be at least 1".to_string(),
            });
        }
        for (field, secs) in [
            ("connectTimeoutSecs", self.connect_timeout_secs),
            ("responseTimeoutSecs", self.response_timeout_secs),
            ("readTimeoutSecs", self.read_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::InvalidOption {
                    field,
                    reason: "must be at least 1 second".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            response: Duration::from_secs(self.response_timeout_secs),
            read: Duration::from_secs(self.read_timeout_secs),
        }
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Request options shared by every download of a run; callers add the
    /// checksum and progress callback per file.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::default()
            .max_retries(self.max_retries)
            .retry_backoff(Duration::from_millis(self.retry_backoff_ms))
            .timeouts(self.timeouts())
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            max_concurrent: self.max_concurrent,
        }
    }
}
