//! Filesystem primitives for packsync.
//!
//! Everything here is built around one guarantee: a synced directory is
//! only ever observed as a complete old tree or a complete new tree. New
//! trees are assembled in a [`Workspace`] next to their destination and
//! swapped in with [`replace_dir`]; [`recover`] repairs whatever an
//! interrupted swap left behind.

mod error;
pub mod primitives;
mod workspace;

pub use error::{Error, Result};
pub use primitives::{
    FallbackStrategy, HardlinkOrCopyOptions, Recovery, ReplaceDirOptions, SIBLING_TAG, backup_path,
    hardlink_or_copy, recover, replace_dir, sibling_path,
};
pub use workspace::Workspace;
