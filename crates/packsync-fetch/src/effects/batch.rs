//! Bounded-concurrency downloads of many files.

use std::path::PathBuf;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::Semaphore;

use crate::data::FetchOptions;
use crate::effects::{FetchOutcome, Fetcher, HttpClient};
use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Downloads in flight at once. Zero is treated as one.
    pub max_concurrent: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

/// One download of a batch, identified by the caller's `key`.
#[derive(Debug, Clone)]
pub struct BatchJob<K> {
    pub key: K,
    pub url: String,
    pub destination: PathBuf,
    pub options: FetchOptions,
}

#[derive(Debug)]
pub enum BatchOutcome {
    Fetched(FetchOutcome),
    Failed(FetchError),
    /// `should_start` declined the job before it began.
    Skipped,
}

impl<C: HttpClient> Fetcher<C> {
    /// Run `jobs` with at most `max_concurrent` downloads in flight.
    ///
    /// Jobs acquire slots in the order given. `should_start` is asked once per
    /// job, right before it begins; returning `false` skips the job but lets
    /// downloads already running finish. Failures never abort other jobs.
    pub async fn fetch_batch<K>(
        &self,
        jobs: Vec<BatchJob<K>>,
        options: &BatchOptions,
        should_start: impl Fn() -> bool,
    ) -> Vec<(K, BatchOutcome)> {
        self.fetch_batch_with(jobs, options, should_start, |_, _| {}).await
    }

    /// [`fetch_batch`](Self::fetch_batch), calling `on_finished` as each job
    /// completes, in completion order.
    pub async fn fetch_batch_with<K>(
        &self,
        jobs: Vec<BatchJob<K>>,
        options: &BatchOptions,
        should_start: impl Fn() -> bool,
        on_finished: impl Fn(&K, &BatchOutcome),
    ) -> Vec<(K, BatchOutcome)> {
        let semaphore = &Semaphore::new(options.max_concurrent.max(1));
        let should_start = &should_start;

        let mut in_flight: FuturesUnordered<_> = jobs
            .into_iter()
            .map(|job| async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return (job.key, BatchOutcome::Skipped);
                };
                if !should_start() {
                    return (job.key, BatchOutcome::Skipped);
                }
                let outcome = match self.fetch(&job.url, &job.destination, &job.options).await {
                    Ok(fetched) => BatchOutcome::Fetched(fetched),
                    Err(e) => BatchOutcome::Failed(e),
                };
                (job.key, outcome)
            })
            .collect();

        let mut results = Vec::with_capacity(in_flight.len());
        while let Some(result) = in_flight.next().await {
            on_finished(&result.0, &result.1);
            results.push(result);
        }
        results
    }
}
