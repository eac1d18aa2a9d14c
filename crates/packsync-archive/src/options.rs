use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ExtractOptions {
    pub on_progress: Option<Arc<dyn Fn(&Progress) + Send + Sync>>,
}

impl fmt::Debug for ExtractOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractOptions")
            .field("on_progress", &self.on_progress.as_ref().map(|_| "{ ... }"))
            .finish()
    }
}

impl ExtractOptions {
    pub fn on_progress(mut self, callback: Arc<dyn Fn(&Progress) + Send + Sync>) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub(crate) fn report(&self, progress: &Progress) {
        if let Some(callback) = &self.on_progress {
            callback(progress);
        }
    }
}

/// Emitted after every extracted file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    pub files_done: u64,
    /// Non-directory entries in the archive, symlinks included.
    pub files_total: u64,
    pub bytes_written: u64,
    pub current_file: PathBuf,
}
