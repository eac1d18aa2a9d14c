//! Hooks run by the dispatcher at the end of a sync.
//!
//! Hook failures are logged and never change the sync result.

use std::path::Path;

use crate::error::SyncResult;

#[derive(Debug, thiserror::Error)]
#[error("hook '{hook}' failed: {message}")]
pub struct HookError {
    pub hook: &'static str,
    pub message: String,
}

pub trait SyncHook: Send + Sync {
    /// Name of this hook for logs.
    fn name(&self) -> &'static str;

    /// Called once a new tree has been swapped into `target`, before
    /// [`post_sync`](Self::post_sync).
    fn post_apply(&self, _target: &Path) -> Result<(), HookError> {
        Ok(())
    }

    /// Called after every run, whatever its result.
    fn post_sync(&self, _target: &Path, _result: &SyncResult) -> Result<(), HookError> {
        Ok(())
    }
}

pub(crate) fn run_post_apply(hooks: &[Box<dyn SyncHook>], target: &Path) {
    for hook in hooks {
        if let Err(e) = hook.post_apply(target) {
            tracing::warn!(hook = hook.name(), error = %e, "post-apply hook failed");
        }
    }
}

pub(crate) fn run_post_sync(hooks: &[Box<dyn SyncHook>], target: &Path, result: &SyncResult) {
    for hook in hooks {
        if let Err(e) = hook.post_sync(target, result) {
            tracing::warn!(hook = hook.name(), error = %e, "post-sync hook failed");
        }
    }
}
