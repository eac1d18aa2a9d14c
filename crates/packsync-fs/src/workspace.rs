use std::path::{Path, PathBuf};

use crate::primitives::{ReplaceDirOptions, replace_dir, sibling_path};
use crate::{Error, Result};

/// A staging directory that becomes `destination` on [`commit`](Self::commit)
/// and is removed if dropped uncommitted.
#[derive(Debug)]
pub struct Workspace {
    staging_path: PathBuf,
    destination_path: PathBuf,
    committed: bool,
}

impl Workspace {
    pub fn new(staging_dir: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<Self> {
        let staging_path = staging_dir.as_ref().to_path_buf();
        let destination_path = destination.as_ref().to_path_buf();

        std::fs::create_dir_all(&staging_path).map_err(|e| Error::Write {
            path: staging_path.clone(),
            source: e,
        })?;

        Ok(Self {
            staging_path,
            destination_path,
            committed: false,
        })
    }

    /// Stage next to `destination` so the final swap is a same-filesystem
    /// rename. The directory name carries `label` plus a random suffix and is
    /// matched by [`recover`](crate::recover) if the process dies.
    pub fn adjacent(destination: impl AsRef<Path>, label: &str) -> Result<Self> {
        let destination = destination.as_ref();
        let unique = uuid::Uuid::new_v4().simple().to_string();
        let staging = sibling_path(destination, &format!("{label}-{}", &unique[..12]))?;
        Self::new(staging, destination)
    }

    pub fn path(&self) -> &Path {
        &self.staging_path
    }

    pub fn destination(&self) -> &Path {
        &self.destination_path
    }

    pub fn commit(self) -> Result<()> {
        self.commit_with(ReplaceDirOptions::default())
    }

    pub fn commit_with(mut self, options: ReplaceDirOptions) -> Result<()> {
        replace_dir(&self.staging_path, &self.destination_path, options)?;
        self.committed = true;
        tracing::debug!(destination = %self.destination_path.display(), "workspace committed");
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.committed
            && self.staging_path.exists()
            && let Err(e) = std::fs::remove_dir_all(&self.staging_path)
        {
            tracing::warn!(
                path = %self.staging_path.display(),
                error = %e,
                "failed to discard staging directory"
            );
        }
    }
}
