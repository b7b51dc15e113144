//! Centralized path resolution for tasktick's files.
//!
//! Everything lives under `$HOME/.tasktick` unless an environment variable
//! overrides the individual file.

use std::path::PathBuf;

use crate::store::STORAGE_KEY;

/// Resolve the data directory: `$HOME/.tasktick`.
pub fn data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".tasktick")
}

/// Resolve the task store path.
/// Checks `TASKTICK_STORE`, falls back to `$HOME/.tasktick/studyTasks.json`.
pub fn store_path() -> PathBuf {
    std::env::var_os("TASKTICK_STORE")
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join(format!("{STORAGE_KEY}.json")))
}

/// Resolve the config path.
/// Checks `TASKTICK_CONFIG`, falls back to `$HOME/.tasktick/config.toml`.
pub fn config_path() -> PathBuf {
    std::env::var_os("TASKTICK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join("config.toml"))
}

/// Log file used by the long-running commands.
pub fn log_path() -> PathBuf {
    data_dir().join("tasktick.log")
}
