//! Configuration file location
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/recipe-runner/`
//! - macOS: `~/Library/Application Support/recipe-runner/`
//! - Windows: `%APPDATA%\recipe-runner\`

use std::path::PathBuf;

const APP_NAME: &str = "recipe-runner";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}
