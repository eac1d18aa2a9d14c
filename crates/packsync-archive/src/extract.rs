use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::options::{ExtractOptions, Progress};
use crate::report::{ArchiveReport, EntryKind, ExtractedEntry};
use crate::sanitize::sanitize_entry_name;

const COPY_BUFFER: usize = 64 * 1024;

/// Extract a zip archive into `destination`.
///
/// Every entry name is sanitized before anything is written; the first
/// unsafe name aborts extraction with [`Error::ZipSlip`]. Read failures,
/// including CRC mismatches discovered at the end of an entry, surface as
/// [`Error::Corrupted`]. An entry nested under a file entry fails with
/// [`Error::Conflict`] before anything is written. Symlink entries are
/// skipped.
pub fn extract_from_reader<R: Read + Seek>(
    reader: R,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<ArchiveReport> {
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| Error::Corrupted(e.to_string()))?;
    // Validate every name up front so a hostile entry late in the archive
    // cannot leave earlier entries half-extracted.
    let mut files_total = 0u64;
    let mut files = HashSet::new();
    let mut entries = Vec::new();
    for name in archive.file_names() {
        let sanitized = sanitize_entry_name(name)?;
        if sanitized.is_root() {
            continue;
        }
        let is_dir = name.ends_with(['/', '\\']);
        if !is_dir {
            files_total += 1;
            files.insert(sanitized.relative.clone());
        }
        entries.push((sanitized, is_dir));
    }
    // A file cannot also be a directory on disk.
    for (sanitized, is_dir) in &entries {
        let skip = if *is_dir { 0 } else { 1 };
        if let Some(file) = sanitized.relative.ancestors().skip(skip).find(|a| files.contains(*a)) {
            return Err(Error::Conflict {
                entry: sanitized.original.clone(),
                file: file.display().to_string(),
            });
        }
    }

    let mut report = ArchiveReport::default();
    let mut buffer = vec![0u8; COPY_BUFFER];

    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| Error::Corrupted(e.to_string()))?;
        let sanitized = sanitize_entry_name(file.name())?;
        if sanitized.is_root() {
            continue;
        }
        let target = sanitized.resolve(destination);

        if file.is_dir() {
            create_dir(&target)?;
            report.entries.push(ExtractedEntry {
                relative_path: sanitized.relative,
                size: 0,
                kind: EntryKind::Directory,
            });
            continue;
        }

        if file.is_symlink() {
            tracing::warn!(entry = %sanitized.original, "skipping symlink entry");
            report.entries.push(ExtractedEntry {
                relative_path: sanitized.relative,
                size: 0,
                kind: EntryKind::SkippedSymlink,
            });
            continue;
        }

        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }
        let out = File::create(&target).map_err(|e| Error::ExtractionFailed {
            path: target.clone(),
            source: e,
        })?;
        let written = copy_entry(&mut file, BufWriter::new(out), &mut buffer).map_err(|e| match e {
            CopyError::Read(e) => Error::Corrupted(format!("{}: {e}", sanitized.original)),
            CopyError::Write(e) => Error::ExtractionFailed {
                path: target.clone(),
                source: e,
            },
        })?;

        report.total_bytes += written;
        report.entries.push(ExtractedEntry {
            relative_path: sanitized.relative.clone(),
            size: written,
            kind: EntryKind::File,
        });
        options.report(&Progress {
            files_done: report.file_count() as u64,
            files_total,
            bytes_written: report.total_bytes,
            current_file: sanitized.relative,
        });
    }

    tracing::debug!(
        destination = %destination.display(),
        files = report.file_count(),
        bytes = report.total_bytes,
        "archive extracted"
    );
    Ok(report)
}

enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

fn copy_entry(
    reader: &mut impl Read,
    mut writer: impl Write,
    buffer: &mut [u8],
) -> std::result::Result<u64, CopyError> {
    let mut total = 0u64;
    loop {
        let n = match reader.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };
        writer.write_all(&buffer[..n]).map_err(CopyError::Write)?;
        total += n as u64;
    }
    writer.flush().map_err(CopyError::Write)?;
    Ok(total)
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::DirectoryCreationFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
