use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use packsync_fetch::{
    BatchJob, BatchOptions, BatchOutcome, BoxStream, FetchError, FetchOptions, FetchPhase, Fetcher,
    HttpClient, HttpResponse, Progress, Timeouts,
};
use packsync_verify::Sha256Hasher;
use tempfile::tempdir;

#[derive(Debug)]
struct TestError(String);

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TestError {}

#[derive(Clone)]
enum Reply {
    Body(Vec<u8>),
    Status(u16),
    Refused,
    Stall,
}

/// Scripted client: each URL answers with its queued replies in order and
/// repeats the last one forever.
#[derive(Default)]
struct TestHttpClient {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    hits: Mutex<HashMap<String, u32>>,
}

impl TestHttpClient {
    fn with(self, url: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into_iter().collect());
        self
    }

    fn hits(&self, url: &str) -> u32 {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn next_reply(&self, url: &str) -> Option<Reply> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;
        let mut replies = self.replies.lock().unwrap();
        let queue = replies.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl HttpClient for TestHttpClient {
    type Error = TestError;

    fn get(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<HttpResponse<TestError>, TestError>> + Send {
        let reply = self.next_reply(url);
        async move {
            let (status, body): (u16, BoxStream<'static, Result<Bytes, TestError>>) = match reply {
                None => (404, Box::pin(futures_util::stream::empty())),
                Some(Reply::Status(status)) => (status, Box::pin(futures_util::stream::empty())),
                Some(Reply::Refused) => return Err(TestError("connection refused".into())),
                Some(Reply::Stall) => (200, Box::pin(futures_util::stream::pending())),
                Some(Reply::Body(data)) => {
                    let chunks: Vec<_> = data
                        .chunks(4)
                        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                        .collect();
                    (200, Box::pin(futures_util::stream::iter(chunks)))
                }
            };
            Ok(HttpResponse {
                status,
                content_length: None,
                body,
            })
        }
    }
}

fn fast() -> FetchOptions {
    FetchOptions::default().retry_backoff(Duration::ZERO)
}

#[tokio::test]
async fn test_fetch_verifies_and_places_file() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("assets/a.txt");
    let client =
        TestHttpClient::default().with("http://h/a.txt", [Reply::Body(b"hello world".to_vec())]);
    let fetcher = Fetcher::new(client);

    let seen = Arc::new(Mutex::new(Vec::<Progress>::new()));
    let sink = Arc::clone(&seen);
    let options = fast()
        .checksum(Some(Sha256Hasher::digest(b"hello world")))
        .on_progress(Arc::new(move |p: &Progress| sink.lock().unwrap().push(p.clone())));

    let outcome = fetcher.fetch("http://h/a.txt", &dest, &options).await.unwrap();

    assert_eq!(outcome.bytes, 11);
    assert_eq!(outcome.hash, Sha256Hasher::digest(b"hello world"));
    assert_eq!(std::fs::read(&dest).unwrap(), b"hello world");
    assert!(!dir.path().join("assets/a.txt.part").exists());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first().map(|p| p.phase), Some(FetchPhase::Connecting));
    assert_eq!(
        seen.last().map(|p| (p.phase, p.bytes_downloaded)),
        Some((FetchPhase::Completed, 11))
    );
}

#[tokio::test]
async fn test_checksum_mismatch_is_final_and_leaves_nothing() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("b.txt");
    let client =
        TestHttpClient::default().with("http://h/b.txt", [Reply::Body(b"tampered".to_vec())]);
    let fetcher = Fetcher::new(client);
    let options = fast().checksum(Some(Sha256Hasher::digest(b"original")));

    let err = fetcher.fetch("http://h/b.txt", &dest, &options).await.unwrap_err();

    assert!(matches!(err, FetchError::ChecksumMismatch { .. }));
    assert_eq!(fetcher.client().hits("http://h/b.txt"), 1);
    assert!(!dest.exists());
    assert!(!dir.path().join("b.txt.part").exists());
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let dir = tempdir().unwrap();
    let url = "http://h/c.txt";
    let client = TestHttpClient::default().with(
        url,
        [Reply::Status(503), Reply::Refused, Reply::Body(b"ok".to_vec())],
    );
    let fetcher = Fetcher::new(client);

    fetcher.fetch(url, &dir.path().join("c.txt"), &fast()).await.unwrap();

    assert_eq!(fetcher.client().hits(url), 3);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let dir = tempdir().unwrap();
    let url = "http://h/missing.txt";
    let fetcher = Fetcher::new(TestHttpClient::default().with(url, [Reply::Status(404)]));

    let err = fetcher.fetch(url, &dir.path().join("m.txt"), &fast()).await.unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 404, .. }));
    assert_eq!(fetcher.client().hits(url), 1);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let url = "http://h/manifest.json";
    let fetcher = Fetcher::new(TestHttpClient::default().with(url, [Reply::Status(500)]));

    let err = fetcher.fetch_bytes(url, &fast().max_retries(2)).await.unwrap_err();

    match err {
        FetchError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, FetchError::Status { status: 500, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fetcher.client().hits(url), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_body_times_out() {
    let url = "http://h/slow.bin";
    let fetcher = Fetcher::new(TestHttpClient::default().with(url, [Reply::Stall]));
    let options = fast().max_retries(0).timeouts(Timeouts {
        read: Duration::from_secs(5),
        ..Timeouts::default()
    });

    let err = fetcher.fetch_bytes(url, &options).await.unwrap_err();

    assert!(matches!(err, FetchError::Timeout { stage: "reading", .. }));
}

#[tokio::test]
async fn test_batch_skips_jobs_once_gate_closes() {
    let dir = tempdir().unwrap();
    let mut client = TestHttpClient::default();
    let mut jobs = Vec::new();
    for name in ["a", "b", "c"] {
        let url = format!("http://h/{name}");
        client = client.with(&url, [Reply::Body(name.as_bytes().to_vec())]);
        jobs.push(BatchJob {
            key: name,
            url,
            destination: dir.path().join(name),
            options: fast(),
        });
    }
    let fetcher = Fetcher::new(client);
    let started = AtomicUsize::new(0);

    let results = fetcher
        .fetch_batch(jobs, &BatchOptions { max_concurrent: 1 }, || {
            started.fetch_add(1, Ordering::SeqCst) < 2
        })
        .await;

    let fetched = results
        .iter()
        .filter(|(_, o)| matches!(o, BatchOutcome::Fetched(_)))
        .count();
    let skipped: Vec<_> = results
        .iter()
        .filter(|(_, o)| matches!(o, BatchOutcome::Skipped))
        .map(|(k, _)| *k)
        .collect();
    assert_eq!(fetched, 2);
    assert_eq!(skipped.len(), 1);
    assert!(!dir.path().join(skipped[0]).exists());
}

#[tokio::test]
async fn test_batch_failures_do_not_abort_others() {
    let dir = tempdir().unwrap();
    let client = TestHttpClient::default()
        .with("http://h/good", [Reply::Body(b"good".to_vec())])
        .with("http://h/bad", [Reply::Status(403)]);
    let fetcher = Fetcher::new(client);
    let jobs = ["bad", "good"]
        .into_iter()
        .map(|name| BatchJob {
            key: name,
            url: format!("http://h/{name}"),
            destination: dir.path().join(name),
            options: fast(),
        })
        .collect();

    let results = fetcher.fetch_batch(jobs, &BatchOptions::default(), || true).await;

    assert_eq!(results.len(), 2);
    for (key, outcome) in results {
        match (key, outcome) {
            ("good", BatchOutcome::Fetched(f)) => assert_eq!(f.bytes, 4),
            ("bad", BatchOutcome::Failed(e)) => {
                assert!(matches!(e, FetchError::Status { status: 403, .. }))
            }
            (key, outcome) => panic!("unexpected outcome for {key}: {outcome:?}"),
        }
    }
}

#[tokio::test]
async fn test_batch_reports_each_finished_job() {
    let dir = tempdir().unwrap();
    let client = TestHttpClient::default()
        .with("http://h/one", [Reply::Body(b"1".to_vec())])
        .with("http://h/two", [Reply::Status(404)]);
    let fetcher = Fetcher::new(client);
    let jobs = ["one", "two"]
        .into_iter()
        .map(|name| BatchJob {
            key: name,
            url: format!("http://h/{name}"),
            destination: dir.path().join(name),
            options: fast(),
        })
        .collect();
    let finished = Mutex::new(Vec::new());

    let results = fetcher
        .fetch_batch_with(jobs, &BatchOptions::default(), || true, |key, outcome| {
            finished.lock().unwrap().push((*key, matches!(outcome, BatchOutcome::Fetched(_))));
        })
        .await;

    let mut finished = finished.into_inner().unwrap();
    finished.sort();
    assert_eq!(finished, vec![("one", true), ("two", false)]);
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_fetch_bytes_stops_past_the_limit() {
    let url = "http://h/manifest.json";
    let client = TestHttpClient::default().with(url, [Reply::Body(b"0123456789".to_vec())]);
    let fetcher = Fetcher::new(client);

    let err = fetcher.fetch_bytes(url, &fast().max_bytes(Some(8))).await.unwrap_err();
    assert!(matches!(err, FetchError::TooLarge { limit: 8, .. }));
    assert!(!err.is_retryable());
    assert_eq!(fetcher.client().hits(url), 1);

    let body = fetcher.fetch_bytes(url, &fast().max_bytes(Some(10))).await.unwrap();
    assert_eq!(&body[..], b"0123456789");
}
