//! Report environment metadata
//!
//! Writes `environment.properties` so the test report shows where the run
//! happened.

use std::path::{Path, PathBuf};

use crate::common::{paths, Config};

/// Facts about the machine and target recorded with each run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentInfo {
    pub os: String,
    pub runner: String,
    pub server_url: String,
    pub device_name: Option<String>,
    pub udid: Option<String>,
}

impl EnvironmentInfo {
    pub fn collect(config: &Config) -> Self {
        let info = os_info::get();
        Self {
            os: format!("{} {}", info.os_type(), info.version()),
            runner: format!("droid-e2e {}", env!("CARGO_PKG_VERSION")),
            server_url: config.session.server_url.clone(),
            device_name: config.device.name.clone(),
            udid: config.device.serial.clone(),
        }
    }

    /// Render as a Java-style properties file
    pub fn to_properties(&self) -> String {
        let mut lines = vec![
            format!("OS={}", self.os),
            format!("Runner={}", self.runner),
            format!("AppiumServerURL={}", self.server_url),
        ];
        if let Some(name) = &self.device_name {
            lines.push(format!("DeviceName={}", name));
        }
        if let Some(udid) = &self.udid {
            lines.push(format!("UDID={}", udid));
        }
        lines.join("\n") + "\n"
    }
}

/// Write `environment.properties` into `dir`
///
/// Failures are logged and otherwise ignored; a missing metadata file
/// must not fail the run.
pub fn write_environment_file(dir: &Path, info: &EnvironmentInfo) -> Option<PathBuf> {
    let path = dir.join(paths::ENVIRONMENT_FILE);
    let result = paths::ensure_dir(dir).and_then(|_| std::fs::write(&path, info.to_properties()));
    match result {
        Ok(()) => Some(path),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not write environment file");
            None
        }
    }
}
