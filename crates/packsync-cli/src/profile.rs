use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use packsync::{SourceDescriptor, SyncOptions};
use serde::Deserialize;

/// The CLI's JSON config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default = "default_local_pack_name")]
    pub local_pack_name: String,
    /// Relative paths resolve against the config file's directory.
    #[serde(default = "default_pack_base_dir")]
    pub pack_base_dir: PathBuf,
    #[serde(default)]
    pub active_source: Option<ActiveSource>,
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
    #[serde(default)]
    pub sync: SyncOptions,
    #[serde(default)]
    pub log: LogConfig,
}

/// Either the name of an entry in `sources` or a full descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ActiveSource {
    Name(String),
    Inline(SourceDescriptor),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_local_pack_name() -> String {
    "SyncedPack".to_string()
}
fn default_pack_base_dir() -> PathBuf {
    PathBuf::from("resourcepacks")
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Profile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let mut profile: Profile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config '{}'", path.display()))?;

        if profile.pack_base_dir.is_relative()
            && let Some(dir) = path.parent()
        {
            profile.pack_base_dir = dir.join(&profile.pack_base_dir);
        }
        profile.sync.validate().context("invalid 'sync' options")?;
        Ok(profile)
    }

    /// Directory the pack is synced into.
    pub fn target(&self) -> PathBuf {
        self.pack_base_dir.join(&self.local_pack_name)
    }

    /// `name` if given, else the active source, else the only configured one.
    pub fn source(&self, name: Option<&str>) -> Result<SourceDescriptor> {
        let name = match (name, &self.active_source) {
            (Some(name), _) => name,
            (None, Some(ActiveSource::Name(name))) => name.as_str(),
            (None, Some(ActiveSource::Inline(source))) => return Ok(source.clone()),
            (None, None) => match self.sources.as_slice() {
                [only] => return Ok(only.clone()),
                [] => bail!("no sources configured"),
                _ => bail!(
                    "several sources configured; pick one with --source or set 'activeSource'"
                ),
            },
        };
        self.sources
            .iter()
            .find(|source| source.name == name)
            .cloned()
            .with_context(|| format!("unknown source '{name}'"))
    }

    /// Name of the source `sync` uses without `--source`, if it resolves.
    pub fn active_name(&self) -> Option<String> {
        self.source(None).ok().map(|source| source.name)
    }
}
