use std::io::ErrorKind;
use std::path::Path;

use crate::{Error, Result};

/// What [`hardlink_or_copy`] does when the filesystem refuses a hard link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FallbackStrategy {
    #[default]
    Copy,
    Error,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HardlinkOrCopyOptions {
    fallback: FallbackStrategy,
}

impl HardlinkOrCopyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fallback(mut self, fallback: FallbackStrategy) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Materialize `src` at `dest` without rewriting its bytes when possible.
///
/// Parent directories of `dest` are created. A missing `src` is always an
/// error; any other link failure (cross-device, unsupported filesystem,
/// link-count limits) falls back according to `options`.
pub fn hardlink_or_copy(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: HardlinkOrCopyOptions,
) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();
    ensure_parent(dest)?;

    match std::fs::hard_link(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::Read {
            path: src.to_path_buf(),
            source: e,
        }),
        Err(e) => match options.fallback {
            FallbackStrategy::Copy => {
                tracing::trace!(src = %src.display(), error = %e, "hard link refused, copying");
                copy_file(src, dest)
            }
            FallbackStrategy::Error if e.kind() == ErrorKind::CrossesDevices => {
                Err(Error::CrossDeviceHardlink)
            }
            FallbackStrategy::Error => Err(Error::Write {
                path: dest.to_path_buf(),
                source: e,
            }),
        },
    }
}

fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    std::fs::copy(src, dest).map(drop).map_err(|e| Error::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| Error::Write {
                path: parent.to_path_buf(),
                source: e,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_hardlink_or_copy_creates_parents() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dest = dir.path().join("a/b/dest.txt");
        std::fs::write(&src, "data").unwrap();

        hardlink_or_copy(&src, &dest, HardlinkOrCopyOptions::new()).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"data");
        assert!(src.exists());
    }

    #[test]
    fn test_hardlink_or_copy_missing_source() {
        let dir = tempdir().unwrap();
        let result = hardlink_or_copy(
            dir.path().join("nope"),
            dir.path().join("dest"),
            HardlinkOrCopyOptions::new(),
        );
        assert!(matches!(result, Err(Error::Read { .. })));
    }
}
