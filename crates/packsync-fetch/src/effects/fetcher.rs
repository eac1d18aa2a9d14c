use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use packsync_verify::{ContentHash, Hasher, Sha256Hasher};
use tokio::io::AsyncWriteExt;

use crate::core::{is_success, retry_delay};
use crate::data::{FetchOptions, FetchPhase, Progress};
use crate::effects::http::{HttpClient, HttpResponse};
use crate::error::{FetchError, Result};

const MAX_PREALLOC: u64 = 1 << 20;

/// A file fetched to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub path: PathBuf,
    pub bytes: u64,
    pub hash: ContentHash,
}

/// Downloads with retry, timeouts and streaming SHA-256 verification.
pub struct Fetcher<C: HttpClient> {
    client: C,
}

impl<C: HttpClient> Fetcher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetch a small body into memory, failing with
    /// [`FetchError::TooLarge`] past `options.max_bytes`.
    pub async fn fetch_bytes(&self, url: &str, options: &FetchOptions) -> Result<Bytes> {
        self.with_retry(url, options, |retry| self.bytes_attempt(url, options, retry))
            .await
    }

    /// Stream `url` to `destination`.
    ///
    /// Bytes land in a `.part` sibling first and are renamed into place only
    /// after the checksum (if any) matched, so `destination` never holds a
    /// partial or unverified body. Concurrent fetches must not target both
    /// `x` and `x.part` in one directory.
    pub async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        options: &FetchOptions,
    ) -> Result<FetchOutcome> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::io(parent, e))?;
        }
        let part = part_path(destination);
        let part = part.as_path();

        let result = self
            .with_retry(url, options, |retry| {
                self.file_attempt(url, destination, part, options, retry)
            })
            .await;

        if result.is_err()
            && let Err(e) = tokio::fs::remove_file(part).await
            && e.kind() != ErrorKind::NotFound
        {
            tracing::warn!(path = %part.display(), error = %e, "failed to remove partial download");
        }
        result
    }

    async fn with_retry<T, F, Fut>(
        &self,
        url: &str,
        options: &FetchOptions,
        mut attempt: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            match attempt(retry).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retry < options.max_retries => {
                    let delay = retry_delay(retry, options.retry_backoff);
                    tracing::debug!(
                        url,
                        retry = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) if retry > 0 && e.is_retryable() => {
                    return Err(FetchError::RetriesExhausted {
                        attempts: retry + 1,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn open(
        &self,
        url: &str,
        options: &FetchOptions,
        retry: u32,
    ) -> Result<HttpResponse<C::Error>> {
        options.report(&Progress::new(FetchPhase::Connecting, retry));

        let response = tokio::time::timeout(options.timeouts.response, self.client.get(url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                stage: "waiting for response from",
            })?
            .map_err(|e| FetchError::Network(error_chain(&e)))?;

        tracing::debug!(
            url,
            status = response.status,
            content_length = ?response.content_length,
            "response"
        );
        if !is_success(response.status) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }

    async fn next_chunk(
        response: &mut HttpResponse<C::Error>,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Option<Bytes>> {
        match tokio::time::timeout(options.timeouts.read, response.body.next()).await {
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                stage: "reading",
            }),
            Ok(None) => Ok(None),
            Ok(Some(Err(e))) => Err(FetchError::Network(error_chain(&e))),
            Ok(Some(Ok(chunk))) => Ok(Some(chunk)),
        }
    }

    async fn bytes_attempt(&self, url: &str, options: &FetchOptions, retry: u32) -> Result<Bytes> {
        let mut response = self.open(url, options, retry).await?;
        let too_large = |limit| FetchError::TooLarge {
            url: url.to_string(),
            limit,
        };
        if let (Some(limit), Some(length)) = (options.max_bytes, response.content_length)
            && length > limit
        {
            return Err(too_large(limit));
        }
        let capacity = response.content_length.unwrap_or(0).min(MAX_PREALLOC) as usize;
        let mut buffer = BytesMut::with_capacity(capacity);
        let mut hasher = Sha256Hasher::new();
        let mut progress = downloading(&response, retry);
        options.report(&progress);

        while let Some(chunk) = Self::next_chunk(&mut response, url, options).await? {
            if let Some(limit) = options.max_bytes
                && (buffer.len() + chunk.len()) as u64 > limit
            {
                return Err(too_large(limit));
            }
            hasher.update(&chunk);
            buffer.extend_from_slice(&chunk);
            progress.bytes_downloaded += chunk.len() as u64;
            options.report(&progress);
        }

        progress.phase = FetchPhase::Verifying;
        options.report(&progress);
        verify(options, hasher.finalize())?;

        progress.phase = FetchPhase::Completed;
        options.report(&progress);
        Ok(buffer.freeze())
    }

    async fn file_attempt(
        &self,
        url: &str,
        destination: &Path,
        part: &Path,
        options: &FetchOptions,
        retry: u32,
    ) -> Result<FetchOutcome> {
        let mut response = self.open(url, options, retry).await?;
        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| FetchError::io(part, e))?;
        let mut hasher = Sha256Hasher::new();
        let mut progress = downloading(&response, retry);
        options.report(&progress);

        while let Some(chunk) = Self::next_chunk(&mut response, url, options).await? {
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::io(part, e))?;
            progress.bytes_downloaded += chunk.len() as u64;
            options.report(&progress);
        }
        file.flush().await.map_err(|e| FetchError::io(part, e))?;
        drop(file);

        progress.phase = FetchPhase::Verifying;
        options.report(&progress);
        let hash = verify(options, hasher.finalize())?;

        progress.phase = FetchPhase::Committing;
        options.report(&progress);
        tokio::fs::rename(part, destination)
            .await
            .map_err(|e| FetchError::io(destination, e))?;

        progress.phase = FetchPhase::Completed;
        options.report(&progress);
        Ok(FetchOutcome {
            path: destination.to_path_buf(),
            bytes: progress.bytes_downloaded,
            hash,
        })
    }
}

fn downloading<E>(response: &HttpResponse<E>, retry: u32) -> Progress {
    let mut progress = Progress::new(FetchPhase::Downloading, retry);
    progress.total_bytes = response.content_length;
    progress
}

fn verify(options: &FetchOptions, actual: ContentHash) -> Result<ContentHash> {
    match options.checksum {
        Some(expected) if expected != actual => {
            Err(FetchError::ChecksumMismatch { expected, actual })
        }
        _ => Ok(actual),
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    destination.with_file_name(name)
}

/// `Display` of an error followed by its sources; transport errors carry the
/// useful part (DNS, TLS, reset) in the chain.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
