//! Configuration and results paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/droid-e2e/`, `~/.local/share/droid-e2e/`
//! - macOS: `~/Library/Application Support/droid-e2e/`
//! - Windows: `%APPDATA%\droid-e2e\`

use std::io;
use std::path::{Path, PathBuf};

/// Name used for the config and data directories
const APP_NAME: &str = "droid-e2e";

/// File name of the report metadata written into the results directory
pub const ENVIRONMENT_FILE: &str = "environment.properties";

/// File name of the run log written into the results directory
pub const LOG_FILE: &str = "droid-e2e.log";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Default results directory when none is configured
pub fn default_results_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().join("results"))
        .unwrap_or_else(|| PathBuf::from("droid-e2e-results"))
}

/// Ensure a directory exists, creating parents as needed
pub fn ensure_dir(dir: &Path) -> io::Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(dir.to_path_buf())
}

/// Turn a test name into something safe to use in a file name
pub fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "unnamed".to_string()
    } else {
        stem
    }
}
