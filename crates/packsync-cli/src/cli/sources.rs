use std::process::ExitCode;

use anyhow::Result;
use console::style;

use crate::profile::Profile;

#[derive(Clone, Debug, clap::Args)]
pub struct SourcesArg {}

impl SourcesArg {
    pub fn run(self, profile: &Profile) -> Result<ExitCode> {
        let active = profile.active_name();
        if profile.sources.is_empty() {
            match &active {
                Some(name) => println!("{} {name} (inline)", style("*").green().bold()),
                None => println!("no sources configured"),
            }
            return Ok(ExitCode::SUCCESS);
        }

        for source in &profile.sources {
            let marker = if active.as_deref() == Some(source.name.as_str()) {
                style("*").green().bold()
            } else {
                style(" ")
            };
            let mut modes = Vec::new();
            if source.has_manifest {
                modes.push("manifest");
            }
            if source.has_archive {
                modes.push("archive");
            }
            let modes = if modes.is_empty() {
                "unusable".to_string()
            } else {
                modes.join("+")
            };
            println!(
                "{marker} {:<16} {:<10} {}",
                source.name,
                modes,
                style(&source.base_url).dim()
            );
        }
        Ok(ExitCode::SUCCESS)
    }
}
