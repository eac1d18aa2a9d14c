//! HTTP downloading with streaming verification for packsync.
//!
//! Layout follows a data / core / effects split:
//! - `data`: immutable options and progress values
//! - `core`: pure retry and status decisions
//! - `effects`: the [`HttpClient`] seam and the [`Fetcher`] that drives it
//!
//! Every body is hashed while it streams. File downloads go to a `.part`
//! sibling and are renamed into place only once verified.

mod core;
mod data;
mod effects;
mod error;

pub use core::{MAX_RETRY_DELAY, is_retryable_status, is_success, retry_delay};
pub use data::{FetchOptions, FetchPhase, Progress, Timeouts};
pub use effects::{
    BatchJob, BatchOptions, BatchOutcome, BoxStream, FetchOutcome, Fetcher, HttpClient,
    HttpResponse,
};
#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;
pub use error::{FetchError, Result};
