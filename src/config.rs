use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::paths;

pub const DEFAULT_TICK_SECS: u64 = 15;
pub const DEFAULT_SYSTEM_COMMAND: &str = "notify-send";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    pub tick_secs: Option<u64>,
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_secs.unwrap_or(DEFAULT_TICK_SECS))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyConfig {
    /// `"bell"`, `"none"`, or a player command line.
    pub sound: Option<String>,
    /// Whether desktop notifications are permitted.
    pub system: Option<bool>,
    pub system_command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundSetting {
    None,
    Bell,
    Command(Vec<String>),
}

impl NotifyConfig {
    pub fn sound(&self) -> Result<SoundSetting> {
        match self.sound.as_deref().map(str::trim) {
            None | Some("bell") => Ok(SoundSetting::Bell),
            Some("none") | Some("") => Ok(SoundSetting::None),
            Some(cmd) => match shlex::split(cmd) {
                Some(argv) if !argv.is_empty() => Ok(SoundSetting::Command(argv)),
                _ => bail!("invalid sound command '{cmd}'"),
            },
        }
    }

    pub fn system_enabled(&self) -> bool {
        self.system.unwrap_or(true)
    }

    pub fn system_command(&self) -> &str {
        self.system_command
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_COMMAND)
    }
}

impl Config {
    /// Load config from `~/.tasktick/config.toml` (or `$TASKTICK_CONFIG`).
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.scheduler.tick_secs == Some(0) {
            bail!(
                "failed to parse {}: scheduler.tick_secs must be at least 1",
                path.display()
            );
        }
        self.notify
            .sound()
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(())
    }
}
