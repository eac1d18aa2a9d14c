use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to replace directory '{path}': {source}")]
    ReplaceDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("path has no usable file name: '{0}'")]
    InvalidPath(PathBuf),

    #[error("cross-device hardlink not supported")]
    CrossDeviceHardlink,
}

pub type Result<T> = std::result::Result<T, Error>;
