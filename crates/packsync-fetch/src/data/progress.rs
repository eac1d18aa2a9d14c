use std::fmt;

/// Phases of one download attempt:
/// Connecting → Downloading → Verifying → Committing → Completed.
///
/// A retry returns to `Connecting` with `retry_count` incremented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPhase {
    #[default]
    Connecting,
    Downloading,
    Verifying,
    Committing,
    Completed,
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchPhase::Connecting => "Connecting",
            FetchPhase::Downloading => "Downloading",
            FetchPhase::Verifying => "Verifying",
            FetchPhase::Committing => "Committing",
            FetchPhase::Completed => "Completed",
        })
    }
}

/// Snapshot passed to [`FetchOptions::on_progress`](crate::FetchOptions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub phase: FetchPhase,

    /// Bytes received in the current attempt. Resets to zero on retry.
    pub bytes_downloaded: u64,

    /// From Content-Length, when the server sent one.
    pub total_bytes: Option<u64>,

    /// 0 on the first attempt.
    pub retry_count: u32,
}

impl Progress {
    pub(crate) fn new(phase: FetchPhase, retry_count: u32) -> Self {
        Self {
            phase,
            bytes_downloaded: 0,
            total_bytes: None,
            retry_count,
        }
    }

    /// Percentage of `total_bytes` received, if the total is known.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        self.total_bytes.map(|total| match total {
            0 if self.is_completed() => 100.0,
            0 => 0.0,
            total => (self.bytes_downloaded as f64 / total as f64) * 100.0,
        })
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.phase == FetchPhase::Completed
    }

    #[must_use]
    pub fn is_retrying(&self) -> bool {
        self.retry_count > 0
    }
}
