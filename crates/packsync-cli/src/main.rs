use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::app::App;
use crate::profile::Profile;

mod cli;
mod profile;
mod ui;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let app = App::parse();
    let profile = Profile::load(&app.config)?;
    init_logging(&profile.log.level, app.verbose);
    app.cmd.run(&profile).await
}

/// `-v` and `-vv` win over `RUST_LOG`, which wins over the profile.
fn init_logging(level: &str, verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
