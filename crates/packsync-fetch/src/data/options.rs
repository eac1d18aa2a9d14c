use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use packsync_verify::ContentHash;

use super::progress::Progress;

/// Bounds on every network wait.
///
/// `connect` is applied when the client is built; `response` bounds the wait
/// for response headers and `read` the gap between two body chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub response: Duration,
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            response: Duration::from_secs(30),
            read: Duration::from_secs(30),
        }
    }
}

/// Per-request configuration.
///
/// ```
/// use packsync_fetch::FetchOptions;
/// use std::time::Duration;
///
/// let options = FetchOptions::default()
///     .max_retries(5)
///     .retry_backoff(Duration::from_millis(200));
/// ```
#[derive(Clone)]
pub struct FetchOptions {
    /// Expected SHA-256 of the body. The download fails with
    /// `ChecksumMismatch` when it does not match.
    pub checksum: Option<ContentHash>,

    /// Retries after the initial attempt, for retryable failures only.
    ///
    /// Default: 3
    pub max_retries: u32,

    /// Base of the exponential backoff; retry N waits `retry_backoff * 2^N`.
    ///
    /// Default: 200ms
    pub retry_backoff: Duration,

    pub timeouts: Timeouts,

    /// Upper bound on the body length. Only [`Fetcher::fetch_bytes`] reads
    /// whole bodies into memory, and it enforces this.
    ///
    /// [`Fetcher::fetch_bytes`]: crate::Fetcher::fetch_bytes
    pub max_bytes: Option<u64>,

    /// Invoked on phase changes and after every body chunk. Callers that
    /// forward to slow sinks throttle on their side.
    pub on_progress: Option<Arc<dyn Fn(&Progress) + Send + Sync>>,
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("checksum", &self.checksum)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .field("timeouts", &self.timeouts)
            .field("max_bytes", &self.max_bytes)
            .field("on_progress", &self.on_progress.as_ref().map(|_| "{ ... }"))
            .finish()
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            checksum: None,
            max_retries: 3,
            retry_backoff: Duration::from_millis(200),
            timeouts: Timeouts::default(),
            max_bytes: None,
            on_progress: None,
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn checksum(mut self, checksum: Option<ContentHash>) -> Self {
        self.checksum = checksum;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    #[must_use]
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn max_bytes(mut self, max_bytes: Option<u64>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[must_use]
    pub fn on_progress(mut self, on_progress: Arc<dyn Fn(&Progress) + Send + Sync>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub(crate) fn report(&self, progress: &Progress) {
        if let Some(callback) = &self.on_progress {
            callback(progress);
        }
    }
}
