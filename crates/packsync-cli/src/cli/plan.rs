use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use console::style;
use indicatif::HumanBytes;
use packsync::Dispatcher;

use crate::profile::Profile;

#[derive(Clone, Debug, clap::Args)]
pub struct PlanArg {
    #[arg(short, long)]
    pub source: Option<String>,

    #[arg(short, long)]
    pub target: Option<PathBuf>,
}

impl PlanArg {
    pub async fn run(self, profile: &Profile) -> Result<ExitCode> {
        let source = profile.source(self.source.as_deref())?;
        let target = self.target.unwrap_or_else(|| profile.target());
        let dispatcher = Dispatcher::with_reqwest(profile.sync.clone())
            .context("failed to set up the sync engine")?;

        let plan = dispatcher
            .preview(&target, &source)
            .await
            .with_context(|| format!("failed to plan against source '{}'", source.name))?;

        if plan.is_empty() {
            println!("{} is up to date", target.display());
            return Ok(ExitCode::SUCCESS);
        }
        for path in &plan.to_add {
            println!("{} {path}", style("+").green());
        }
        for path in &plan.to_update {
            println!("{} {path}", style("~").yellow());
        }
        for path in &plan.to_delete {
            println!("{} {path}", style("-").red());
        }
        println!(
            "{} added, {} updated, {} deleted, {} to download",
            plan.to_add.len(),
            plan.to_update.len(),
            plan.to_delete.len(),
            HumanBytes(plan.total_bytes)
        );
        Ok(ExitCode::SUCCESS)
    }
}
