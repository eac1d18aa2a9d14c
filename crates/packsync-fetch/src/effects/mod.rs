//! Network and filesystem effects.

mod batch;
mod fetcher;
mod http;

pub use batch::{BatchJob, BatchOptions, BatchOutcome};
pub use fetcher::{FetchOutcome, Fetcher};
pub use http::{BoxStream, HttpClient, HttpResponse};

#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
