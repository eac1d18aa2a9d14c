//! Keeps a local directory identical to a pack published over HTTP.
//!
//! A source publishes a manifest (path, SHA-256, size per file), a whole-pack
//! zip, or both. A run diffs the manifest against a hash scan of the target,
//! downloads only what changed into a staging tree beside the target and
//! swaps that tree in with one rename. When the manifest is unusable or too
//! many files fail, the run falls back to the archive. Either way the target
//! is only ever observed complete: the old tree or the new one.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use packsync::{CancellationToken, NoopSink, SourceDescriptor};
//!
//! # async fn demo() -> Result<(), packsync::ConfigError> {
//! let source = SourceDescriptor::new("main", "https://cdn.example/pack").with_archive(true);
//! let target = Path::new("resourcepacks/Synced");
//! let result = packsync::run_sync(target, &source, Arc::new(NoopSink), &CancellationToken::new())
//!     .await?;
//! println!("{result:?}");
//! # Ok(())
//! # }
//! ```

mod apply;
mod archive;
mod cancel;
mod config;
mod dispatcher;
mod error;
mod hooks;
mod manifest;
mod plan;
mod progress;
mod scan;
mod source;
mod transfer;

pub use cancel::CancellationToken;
pub use config::SyncOptions;
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, SyncError, SyncResult};
pub use hooks::{HookError, SyncHook};
pub use manifest::{
    Manifest, ManifestEntry, ManifestError, ManifestFetcher, PathError, validate_relative_path,
};
pub use packsync_fetch::{BoxStream, HttpClient, HttpResponse};
#[cfg(feature = "reqwest")]
pub use packsync_fetch::ReqwestClient;
pub use plan::{SyncPlan, plan};
pub use progress::{NoopSink, ProgressHandle, ProgressSink, ProgressState, SyncState, Terminal};
pub use scan::{LocalFileRecord, LocalState, scan, scan_local_state};
pub use source::{BaseUrl, SourceDescriptor};

#[cfg(feature = "reqwest")]
impl Dispatcher<ReqwestClient> {
    /// A dispatcher over a reqwest client built from `options`' timeouts.
    pub fn with_reqwest(options: SyncOptions) -> Result<Self, ConfigError> {
        let client = ReqwestClient::with_timeouts(&options.timeouts())?;
        Self::new(client, options)
    }
}

/// One sync with default options over a fresh reqwest client.
#[cfg(feature = "reqwest")]
pub async fn run_sync(
    target: &std::path::Path,
    source: &SourceDescriptor,
    sink: std::sync::Arc<dyn ProgressSink>,
    cancel: &CancellationToken,
) -> Result<SyncResult, ConfigError> {
    let dispatcher = Dispatcher::with_reqwest(SyncOptions::default())?;
    Ok(dispatcher.run_sync(target, source, sink, cancel).await)
}
