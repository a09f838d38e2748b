//! Device bridge invocation
//!
//! Every bridge call is one `adb` process: spawn, wait, capture output.
//! There is no persistent channel to the device.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::common::config::BridgeConfig;
use crate::common::{Error, Result};

/// Captured result of one bridge invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Successful output carrying the given stdout text
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout decoded lossily as UTF-8
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr decoded lossily as UTF-8
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Something that can run device bridge subcommands
///
/// `serial` selects the target device; `None` lets the bridge pick its
/// default (only) target. A non-zero exit status is returned as output,
/// not as an error: callers decide what it means.
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn run(&self, serial: Option<&str>, args: &[&str]) -> Result<CommandOutput>;
}

/// The real `adb` executable
#[derive(Debug, Clone)]
pub struct Adb {
    program: PathBuf,
}

impl Adb {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Resolve the executable from configuration and the Android SDK
    /// environment
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(resolve_adb_path(config.adb_path.as_deref(), |key| {
            std::env::var(key).ok()
        }))
    }

    /// Path of the executable this bridge spawns
    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl Bridge for Adb {
    async fn run(&self, serial: Option<&str>, args: &[&str]) -> Result<CommandOutput> {
        let argv = build_args(serial, args);
        tracing::debug!(program = %self.program.display(), args = ?argv, "adb");

        let output = Command::new(&self.program)
            .args(&argv)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::bridge_unavailable(&self.program, e))?;

        let output = CommandOutput::from(output);
        if !output.success() {
            tracing::debug!(code = ?output.code, stderr = %output.stderr_text().trim(), "adb exited non-zero");
        }
        Ok(output)
    }
}

/// Prepend `-s <serial>` when a serial is known
pub fn build_args(serial: Option<&str>, args: &[&str]) -> Vec<String> {
    let mut argv = Vec::with_capacity(args.len() + 2);
    if let Some(serial) = serial.filter(|s| !s.is_empty()) {
        argv.push("-s".to_string());
        argv.push(serial.to_string());
    }
    argv.extend(args.iter().map(|a| a.to_string()));
    argv
}

/// Locate `adb`
///
/// Order: explicit path, `$ANDROID_HOME/platform-tools`,
/// `$ANDROID_SDK_ROOT/platform-tools`, `PATH`. Falls back to the bare
/// name so a missing tool surfaces as [`Error::BridgeUnavailable`].
pub fn resolve_adb_path<F>(explicit: Option<&Path>, env: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let exe = format!("adb{}", std::env::consts::EXE_SUFFIX);
    for key in ["ANDROID_HOME", "ANDROID_SDK_ROOT"] {
        if let Some(sdk) = env(key).filter(|v| !v.is_empty()) {
            let candidate = PathBuf::from(sdk).join("platform-tools").join(&exe);
            if candidate.is_file() {
                return candidate;
            }
        }
    }

    which::which("adb").unwrap_or_else(|_| PathBuf::from(exe))
}
