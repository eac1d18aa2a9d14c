use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// An archive entry name reduced to a safe relative path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizedPath {
    pub original: String,
    pub relative: PathBuf,
}

impl SanitizedPath {
    pub fn resolve(&self, base: &Path) -> PathBuf {
        base.join(&self.relative)
    }

    /// `true` for names like `./` that denote the root itself.
    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }
}

/// Sanitize a raw entry name.
///
/// Both `/` and `\` separate segments; `.` and empty segments are dropped.
/// Absolute names, drive prefixes and any `..` segment are rejected as
/// zip-slip, even when the `..` would stay inside the root.
pub fn sanitize_entry_name(name: &str) -> Result<SanitizedPath> {
    if name.contains('\0') {
        return Err(Error::InvalidPath {
            entry: name.to_string(),
        });
    }

    let zip_slip = || Error::ZipSlip {
        entry: name.to_string(),
    };
    if name.starts_with(['/', '\\']) || has_drive_prefix(name) {
        return Err(zip_slip());
    }

    let mut relative = PathBuf::new();
    for segment in name.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return Err(zip_slip()),
            segment if segment.contains(':') => return Err(zip_slip()),
            segment => relative.push(segment),
        }
    }

    Ok(SanitizedPath {
        original: name.to_string(),
        relative,
    })
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_pass_through() {
        let sanitized = sanitize_entry_name("assets/minecraft/textures/a.png").unwrap();
        assert_eq!(sanitized.relative, Path::new("assets/minecraft/textures/a.png"));
        assert!(!sanitized.is_root());
    }

    #[test]
    fn separators_and_dots_are_normalized() {
        let sanitized = sanitize_entry_name("./assets\\\\lang//en_us.json").unwrap();
        assert_eq!(sanitized.relative, Path::new("assets/lang/en_us.json"));
        assert!(sanitize_entry_name("./").unwrap().is_root());
    }

    #[test]
    fn traversal_is_rejected() {
        for name in ["../evil", "a/../../evil", "a/..", "..\\evil", "a/../b"] {
            assert!(
                matches!(sanitize_entry_name(name), Err(Error::ZipSlip { .. })),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn absolute_and_drive_paths_are_rejected() {
        for name in ["/etc/passwd", "\\windows\\system32", "C:/evil", "c:evil", "a/C:/evil"] {
            assert!(
                matches!(sanitize_entry_name(name), Err(Error::ZipSlip { .. })),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn nul_is_rejected() {
        assert!(matches!(sanitize_entry_name("a\0b"), Err(Error::InvalidPath { .. })));
    }

    #[test]
    fn resolve_stays_under_base() {
        let base = Path::new("/packs/.SyncedPack.packsync-archive");
        let resolved = sanitize_entry_name("pack.mcmeta").unwrap().resolve(base);
        assert!(resolved.starts_with(base));
    }
}
