//! Immutable configuration and value types.

mod options;
mod progress;

pub use options::{FetchOptions, Timeouts};
pub use progress::{FetchPhase, Progress};
