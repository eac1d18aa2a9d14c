//! Run progress: the snapshot type, the sink seam callers implement, and
//! the tracker the dispatcher feeds.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    FetchingRemoteState,
    Planning,
    Transferring,
    Applying,
    Done,
    Cancelled,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::FetchingRemoteState => "fetching remote state",
            Self::Planning => "planning",
            Self::Transferring => "transferring",
            Self::Applying => "applying",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Succeeded,
    Failed,
    Cancelled,
}

/// A point-in-time view of a run.
///
/// Within one run `files_done` and `bytes_done` never decrease.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub state: SyncState,
    pub files_done: u64,
    pub total_files: u64,
    pub bytes_done: u64,
    pub total_bytes: u64,
    pub terminal: Option<Terminal>,
}

impl ProgressState {
    pub fn fraction(&self) -> Option<f64> {
        (self.total_bytes > 0).then(|| self.bytes_done as f64 / self.total_bytes as f64)
    }
}

/// Receives progress snapshots. Calls are serialized and arrive in order.
pub trait ProgressSink: Send + Sync {
    /// Byte and file counters moved. Throttled.
    fn on_progress(&self, progress: &ProgressState);

    /// The run entered a new state or finished. Never throttled.
    fn on_state_change(&self, progress: &ProgressState) {
        self.on_progress(progress)
    }
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressState) + Send + Sync,
{
    fn on_progress(&self, progress: &ProgressState) {
        self(progress)
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&self, _progress: &ProgressState) {}
}

/// Read side of a dispatcher's progress, safe to poll from any thread.
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle {
    shared: Arc<Mutex<ProgressState>>,
}

impl ProgressHandle {
    pub fn snapshot(&self) -> ProgressState {
        lock(&self.shared).clone()
    }
}

struct Emitter {
    last_emit: Option<Instant>,
    /// Highest byte count reported so far per download, so retries that
    /// restart from zero do not count twice.
    received: HashMap<String, u64>,
    /// Downloads whose announced length was already added to the total.
    announced: HashSet<String>,
    /// Whether the archive's file count was added to the total.
    archive_counted: bool,
}

/// Write side for one run.
pub(crate) struct ProgressTracker {
    shared: Arc<Mutex<ProgressState>>,
    emitter: Mutex<Emitter>,
    sink: Arc<dyn ProgressSink>,
    interval: Duration,
}

impl ProgressTracker {
    /// Resets the handle's state for a fresh run.
    pub(crate) fn new(
        handle: &ProgressHandle,
        sink: Arc<dyn ProgressSink>,
        interval: Duration,
    ) -> Self {
        *lock(&handle.shared) = ProgressState::default();
        Self {
            shared: Arc::clone(&handle.shared),
            emitter: Mutex::new(Emitter {
                last_emit: None,
                received: HashMap::new(),
                announced: HashSet::new(),
                archive_counted: false,
            }),
            sink,
            interval,
        }
    }

    pub(crate) fn set_state(&self, state: SyncState) {
        tracing::debug!(%state, "sync state");
        self.update(Emit::State, |p| p.state = state);
    }

    /// Add work to the totals without touching the done counters.
    pub(crate) fn add_totals(&self, files: u64, bytes: u64) {
        self.update(Emit::Always, |p| {
            p.total_files += files;
            p.total_bytes += bytes;
        });
    }

    /// `received` is the running byte count of the current attempt for
    /// download `key`. `announced` is its length when the server sent one
    /// and the caller did not already count it in the totals.
    pub(crate) fn record_bytes(&self, key: &str, received: u64, announced: Option<u64>) {
        let mut emitter = lock(&self.emitter);
        let mut total_delta = 0;
        if let Some(length) = announced
            && emitter.announced.insert(key.to_string())
        {
            total_delta = length;
        }
        let seen = emitter.received.entry(key.to_string()).or_default();
        let delta = received.saturating_sub(*seen);
        *seen = (*seen).max(received);
        if delta == 0 && total_delta == 0 {
            return;
        }
        self.emit_locked(&mut emitter, Emit::Throttled, |p| {
            p.total_bytes += total_delta;
            p.bytes_done += delta;
            p.total_bytes = p.total_bytes.max(p.bytes_done);
        });
    }

    /// One file finished, whether it succeeded or not.
    pub(crate) fn file_done(&self) {
        self.update(Emit::Always, |p| {
            p.files_done += 1;
            p.total_files = p.total_files.max(p.files_done);
        });
    }

    /// One archive entry was unpacked. The first call adds the archive's
    /// `files_total` to the totals.
    pub(crate) fn file_extracted(&self, files_total: u64) {
        let mut emitter = lock(&self.emitter);
        let first = !std::mem::replace(&mut emitter.archive_counted, true);
        self.emit_locked(&mut emitter, Emit::Throttled, |p| {
            if first {
                p.total_files = p.files_done + files_total;
            }
            p.files_done += 1;
            p.total_files = p.total_files.max(p.files_done);
        });
    }

    pub(crate) fn finish(&self, terminal: Terminal) {
        self.update(Emit::State, |p| {
            p.state = match terminal {
                Terminal::Cancelled => SyncState::Cancelled,
                Terminal::Succeeded | Terminal::Failed => SyncState::Done,
            };
            p.terminal = Some(terminal);
        });
    }

    fn update(&self, emit: Emit, change: impl FnOnce(&mut ProgressState)) {
        let mut emitter = lock(&self.emitter);
        self.emit_locked(&mut emitter, emit, change);
    }

    // The emitter lock serializes sink calls; the snapshot lock is released
    // before the sink runs so sinks may poll a ProgressHandle.
    fn emit_locked(
        &self,
        emitter: &mut MutexGuard<'_, Emitter>,
        emit: Emit,
        change: impl FnOnce(&mut ProgressState),
    ) {
        let snapshot = {
            let mut state = lock(&self.shared);
            change(&mut state);
            state.clone()
        };
        let now = Instant::now();
        let due = emitter
            .last_emit
            .is_none_or(|last| now.duration_since(last) >= self.interval);
        match emit {
            Emit::State => {
                emitter.last_emit = Some(now);
                self.sink.on_state_change(&snapshot);
            }
            Emit::Always => {
                emitter.last_emit = Some(now);
                self.sink.on_progress(&snapshot);
            }
            Emit::Throttled if due => {
                emitter.last_emit = Some(now);
                self.sink.on_progress(&snapshot);
            }
            Emit::Throttled => {}
        }
    }
}

#[derive(Clone, Copy)]
enum Emit {
    /// Reported through [`ProgressSink::on_state_change`].
    State,
    Always,
    /// Dropped when the last emission is younger than the interval.
    Throttled,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
