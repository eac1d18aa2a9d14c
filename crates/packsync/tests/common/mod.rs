#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::StreamExt;
use packsync::{BoxStream, CancellationToken, HttpClient, HttpResponse, ProgressState, SyncOptions};
use packsync_verify::ContentHash;
use zip::write::SimpleFileOptions;

pub const BASE: &str = "http://mock.test/pack";

#[derive(Debug)]
pub struct MockError(String);

impl std::fmt::Display for MockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for MockError {}

#[derive(Clone)]
pub enum Reply {
    Body(Vec<u8>),
    /// Like `Body`, yielding to the runtime before every chunk.
    Trickle(Vec<u8>),
    Status(u16),
}

/// Serves fixed replies per path under [`BASE`]. Unknown paths are 404.
#[derive(Default)]
pub struct MockPackServer {
    routes: Mutex<HashMap<String, Reply>>,
    hits: Mutex<HashMap<String, u32>>,
    /// Cancelled the first time a matching path is requested.
    cancel_on: Mutex<Option<(String, CancellationToken)>>,
}

impl MockPackServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, path: &str, reply: Reply) -> Self {
        self.routes.lock().unwrap().insert(path.to_string(), reply);
        self
    }

    pub fn file(self, path: &str, content: &[u8]) -> Self {
        self.route(path, Reply::Body(content.to_vec()))
    }

    pub fn manifest(self, files: &[(&str, &[u8])]) -> Self {
        let body = manifest_json(files);
        self.file("manifest.json", body.as_bytes())
    }

    /// Serve `files` both as a manifest with per-file routes.
    pub fn pack(self, files: &[(&str, &[u8])]) -> Self {
        files
            .iter()
            .fold(self.manifest(files), |server, (path, content)| server.file(path, content))
    }

    pub fn archive(self, files: &[(&str, &[u8])]) -> Self {
        let body = zip_bytes(files);
        self.file("pack.zip", &body)
    }

    pub fn cancel_on(self, path: &str, token: &CancellationToken) -> Self {
        *self.cancel_on.lock().unwrap() = Some((path.to_string(), token.clone()));
        self
    }

    pub fn hits(&self, path: &str) -> u32 {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    /// Requests for anything but the manifest and the archive.
    pub fn file_hits(&self) -> u32 {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path.as_str() != "manifest.json" && path.as_str() != "pack.zip")
            .map(|(_, hits)| hits)
            .sum()
    }
}

type MockBody = BoxStream<'static, Result<Bytes, MockError>>;

impl HttpClient for MockPackServer {
    type Error = MockError;

    fn get(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<HttpResponse<MockError>, MockError>> + Send {
        let path = url
            .strip_prefix(BASE)
            .map(|rest| rest.trim_start_matches('/').to_string())
            .unwrap_or_default();
        *self.hits.lock().unwrap().entry(path.clone()).or_default() += 1;
        if let Some((trigger, token)) = self.cancel_on.lock().unwrap().as_ref()
            && *trigger == path
        {
            token.cancel();
        }
        let reply = self.routes.lock().unwrap().get(&path).cloned();

        async move {
            let (status, content_length, body): (u16, Option<u64>, MockBody) = match reply {
                None => (404, None, Box::pin(futures_util::stream::empty())),
                Some(Reply::Status(status)) => {
                    (status, None, Box::pin(futures_util::stream::empty()))
                }
                Some(Reply::Body(data)) => {
                    let length = data.len() as u64;
                    (200, Some(length), Box::pin(futures_util::stream::iter(chunks(&data))))
                }
                Some(Reply::Trickle(data)) => {
                    let body = futures_util::stream::iter(chunks(&data)).then(|chunk| async move {
                        tokio::task::yield_now().await;
                        chunk
                    });
                    (200, Some(data.len() as u64), Box::pin(body))
                }
            };
            Ok(HttpResponse {
                status,
                content_length,
                body,
            })
        }
    }
}

fn chunks(data: &[u8]) -> Vec<Result<Bytes, MockError>> {
    data.chunks(7).map(|chunk| Ok(Bytes::copy_from_slice(chunk))).collect()
}

pub fn hash(content: &[u8]) -> ContentHash {
    packsync_verify::hash_reader(content).unwrap().0
}

pub fn manifest_json(files: &[(&str, &[u8])]) -> String {
    let entries: Vec<_> = files
        .iter()
        .map(|(path, content)| {
            serde_json::json!({
                "path": path,
                "hash": hash(content).to_hex(),
                "size": content.len(),
            })
        })
        .collect();
    serde_json::Value::Array(entries).to_string()
}

pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (name, content) in files {
        let path = root.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

/// Every regular file under `root`, as sorted `(path, content)` pairs.
pub fn read_tree(root: &Path) -> Vec<(String, Vec<u8>)> {
    let state = packsync::scan_local_state(root).unwrap();
    state
        .iter()
        .map(|record| (record.path.clone(), std::fs::read(root.join(&record.path)).unwrap()))
        .collect()
}

pub fn tree(files: &[(&str, &[u8])]) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<_> = files.iter().map(|(p, c)| (p.to_string(), c.to_vec())).collect();
    files.sort();
    files
}

/// Entries of the target's parent other than the target itself.
pub fn siblings(target: &Path) -> Vec<String> {
    let name = target.file_name().unwrap();
    std::fs::read_dir(target.parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .filter(|entry| entry != name)
        .map(|entry| entry.to_string_lossy().into_owned())
        .collect()
}

pub fn fast_options() -> SyncOptions {
    SyncOptions {
        retry_backoff_ms: 0,
        max_retries: 1,
        progress_interval_ms: 0,
        ..SyncOptions::default()
    }
}

/// Collects every snapshot a run emits.
#[derive(Clone, Default)]
pub struct Recorder(pub Arc<Mutex<Vec<ProgressState>>>);

impl Recorder {
    pub fn snapshots(&self) -> Vec<ProgressState> {
        self.0.lock().unwrap().clone()
    }
}

impl packsync::ProgressSink for Recorder {
    fn on_progress(&self, progress: &ProgressState) {
        self.0.lock().unwrap().push(progress.clone())
    }
}
