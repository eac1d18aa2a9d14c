use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use super::{plan, sources, sync};
use crate::profile::Profile;

#[derive(Clone, Debug, Parser)]
#[command(
    name = "packsync",
    version = env!("CARGO_PKG_VERSION"),
    about,
    long_about = None,
    propagate_version = true
)]
pub struct App {
    /// Profile file with sources and sync options.
    #[arg(short, long, global = true, default_value = "packsync.json")]
    pub config: PathBuf,

    /// More log output; repeat for trace.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "s", name = "sync", about = "Bring the local pack in line with a source")]
    Sync(sync::SyncArg),
    #[command(
        alias = "p",
        name = "plan",
        about = "Show what a sync would change without changing it"
    )]
    Plan(plan::PlanArg),
    #[command(alias = "ls", name = "sources", about = "List configured sources")]
    Sources(sources::SourcesArg),
}

impl Commands {
    pub async fn run(self, profile: &Profile) -> Result<ExitCode> {
        match self {
            Self::Sync(arg) => arg.run(profile).await,
            Self::Plan(arg) => arg.run(profile).await,
            Self::Sources(arg) => arg.run(profile),
        }
    }
}
