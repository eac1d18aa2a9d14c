pub mod hardlink;
pub mod replace_dir;

pub use hardlink::{FallbackStrategy, HardlinkOrCopyOptions, hardlink_or_copy};
pub use replace_dir::{
    Recovery, ReplaceDirOptions, SIBLING_TAG, backup_path, recover, replace_dir, sibling_path,
};
