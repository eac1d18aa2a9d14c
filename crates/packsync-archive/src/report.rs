use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Present in the archive but not materialized.
    SkippedSymlink,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedEntry {
    pub relative_path: PathBuf,
    pub size: u64,
    pub kind: EntryKind,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub entries: Vec<ExtractedEntry>,
    pub total_bytes: u64,
}

impl ArchiveReport {
    pub fn file_count(&self) -> usize {
        self.entries.iter().filter(|e| e.kind == EntryKind::File).count()
    }
}
