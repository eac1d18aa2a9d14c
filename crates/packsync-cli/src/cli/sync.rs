use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use packsync::{CancellationToken, Dispatcher, HookError, SyncError, SyncHook, SyncResult};

use crate::profile::Profile;
use crate::ui::BarSink;

#[derive(Clone, Debug, clap::Args)]
pub struct SyncArg {
    /// Source name; defaults to the profile's active source.
    #[arg(short, long)]
    pub source: Option<String>,

    /// Directory to sync; defaults to `packBaseDir/localPackName`.
    #[arg(short, long)]
    pub target: Option<PathBuf>,
}

/// Logs where the new tree landed so the host knows to reload it.
struct ReloadNotice;

impl SyncHook for ReloadNotice {
    fn name(&self) -> &'static str {
        "reload_notice"
    }

    fn post_apply(&self, target: &std::path::Path) -> Result<(), HookError> {
        tracing::info!(pack = %target.display(), "pack updated, reload to apply");
        Ok(())
    }
}

impl SyncArg {
    pub async fn run(self, profile: &Profile) -> Result<ExitCode> {
        let source = profile.source(self.source.as_deref())?;
        let target = self.target.unwrap_or_else(|| profile.target());
        let dispatcher = Dispatcher::with_reqwest(profile.sync.clone())
            .context("failed to set up the sync engine")?
            .hook(ReloadNotice);

        let cancel = CancellationToken::new();
        let on_ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling");
                on_ctrl_c.cancel();
            }
        });

        let result = dispatcher
            .run_sync(&target, &source, Arc::new(BarSink::new()), &cancel)
            .await;

        Ok(match result {
            SyncResult::Success => {
                println!("{} {}", style("synced").green().bold(), target.display());
                ExitCode::SUCCESS
            }
            SyncResult::SuccessWithWarnings(skipped) => {
                println!(
                    "{} {} ({} files kept their previous state)",
                    style("synced").yellow().bold(),
                    target.display(),
                    skipped.len()
                );
                for path in skipped {
                    println!("  {} {path}", style("!").yellow());
                }
                ExitCode::SUCCESS
            }
            SyncResult::Failure(SyncError::Cancelled) => {
                eprintln!("{} sync cancelled, nothing changed", style("✗").red());
                ExitCode::from(130)
            }
            SyncResult::Failure(e) => {
                eprintln!("{} {e}", style("sync failed:").red().bold());
                ExitCode::FAILURE
            }
        })
    }
}
