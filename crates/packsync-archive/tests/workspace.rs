use std::io::{Cursor, Write};

use packsync_archive::{Error, ExtractOptions, extract_to_workspace};
use zip::write::SimpleFileOptions;

fn zip_with(entries: &[(&str, &str)]) -> Cursor<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    }
    Cursor::new(writer.finish().unwrap().into_inner())
}

fn names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn commit_replaces_destination() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("SyncedPack");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("stale.txt"), "old").unwrap();

    let extraction = extract_to_workspace(
        zip_with(&[("pack.mcmeta", "{}"), ("assets/a.txt", "a")]),
        &dest,
        &ExtractOptions::default(),
    )
    .unwrap();
    assert!(extraction.path().starts_with(dir.path()));
    assert!(dest.join("stale.txt").exists(), "destination untouched before commit");

    let report = extraction.commit().unwrap();

    assert_eq!(report.file_count(), 2);
    assert_eq!(names(&dest), ["assets", "pack.mcmeta"]);
    assert_eq!(names(dir.path()), ["SyncedPack"]);
}

#[test]
fn failed_extraction_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("SyncedPack");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("keep.txt"), "keep").unwrap();

    let err = extract_to_workspace(
        zip_with(&[("fine.txt", "x"), ("/abs/evil.txt", "y")]),
        &dest,
        &ExtractOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err, Error::ZipSlip { .. }));
    assert_eq!(names(&dest), ["keep.txt"]);
    assert_eq!(names(dir.path()), ["SyncedPack"]);
}

#[test]
fn abort_discards_staging() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("SyncedPack");

    let data = zip_with(&[("a.txt", "a")]);
    let extraction = extract_to_workspace(data, &dest, &ExtractOptions::default()).unwrap();
    let staging = extraction.path().to_path_buf();
    assert!(staging.join("a.txt").exists());

    extraction.abort();

    assert!(!staging.exists());
    assert!(!dest.exists());
}
