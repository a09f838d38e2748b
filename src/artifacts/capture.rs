//! Failure artifact capture
//!
//! When a test body fails, grab whatever evidence the device can still
//! give: the driver's screenshot and page source, or a bridge screenshot
//! if the driver is gone, then the recent logcat. Nothing here fails the
//! caller; every step logs and moves on.

use std::path::{Path, PathBuf};

use crate::bridge::Bridge;
use crate::common::paths;
use crate::session::RemoteSession;

/// Writes artifact files into one results directory
#[derive(Debug, Clone)]
pub struct ArtifactSink {
    dir: PathBuf,
}

impl ArtifactSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `<test>-<label>.<ext>`; returns the path on success
    pub fn write(&self, test_name: &str, label: &str, ext: &str, data: &[u8]) -> Option<PathBuf> {
        let file = format!("{}-{}.{}", paths::sanitize_file_stem(test_name), label, ext);
        let path = self.dir.join(file);
        let written = paths::ensure_dir(&self.dir).and_then(|_| std::fs::write(&path, data));
        match written {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Saved {}", label);
                Some(path)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not save {}", label);
                None
            }
        }
    }
}

/// Where failure evidence comes from
pub struct FailureContext<'a> {
    pub bridge: &'a dyn Bridge,
    pub serial: Option<&'a str>,
    pub driver: Option<&'a RemoteSession>,
    pub logcat_lines: u32,
}

/// Capture screenshot, page source and logcat for a failed test
///
/// Returns the files written.
pub async fn capture_failure(
    sink: &ArtifactSink,
    test_name: &str,
    ctx: &FailureContext<'_>,
) -> Vec<PathBuf> {
    let mut saved = Vec::new();

    let mut have_screenshot = false;
    if let Some(driver) = ctx.driver {
        have_screenshot = capture_from_driver(sink, test_name, driver, &mut saved).await;
    }
    if !have_screenshot {
        if let Some(path) = capture_bridge_screenshot(sink, test_name, ctx.bridge, ctx.serial).await {
            saved.push(path);
        }
    }

    if let Some(path) = capture_logcat(sink, test_name, ctx.bridge, ctx.serial, ctx.logcat_lines).await {
        saved.push(path);
    }

    saved
}

async fn capture_from_driver(
    sink: &ArtifactSink,
    test_name: &str,
    driver: &RemoteSession,
    saved: &mut Vec<PathBuf>,
) -> bool {
    let png = match driver.screenshot().await {
        Ok(png) if !png.is_empty() => png,
        Ok(_) => return false,
        Err(e) => {
            tracing::debug!(error = %e, "Driver screenshot unavailable");
            return false;
        }
    };
    let Some(path) = sink.write(test_name, "screenshot", "png", &png) else {
        return false;
    };
    saved.push(path);

    match driver.page_source().await {
        Ok(source) if !source.is_empty() => {
            if let Some(path) = sink.write(test_name, "page_source", "xml", source.as_bytes()) {
                saved.push(path);
            }
        }
        Ok(_) => {}
        Err(e) => tracing::debug!(error = %e, "Page source unavailable"),
    }
    true
}

/// Screenshot straight from the device (`exec-out screencap -p`)
pub async fn capture_bridge_screenshot(
    sink: &ArtifactSink,
    test_name: &str,
    bridge: &dyn Bridge,
    serial: Option<&str>,
) -> Option<PathBuf> {
    match bridge.run(serial, &["exec-out", "screencap", "-p"]).await {
        Ok(output) if output.success() && !output.stdout.is_empty() => {
            sink.write(test_name, "adb_screenshot", "png", &output.stdout)
        }
        Ok(output) => {
            tracing::debug!(code = ?output.code, "screencap produced nothing");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Bridge screenshot failed");
            None
        }
    }
}

/// Dump the last `lines` of logcat, then clear the buffer
///
/// The buffer is cleared even when the dump fails, so the next test
/// starts with a clean log.
pub async fn capture_logcat(
    sink: &ArtifactSink,
    test_name: &str,
    bridge: &dyn Bridge,
    serial: Option<&str>,
    lines: u32,
) -> Option<PathBuf> {
    let count = lines.to_string();
    let saved = match bridge.run(serial, &["logcat", "-d", "-t", &count]).await {
        Ok(output) if output.success() && !output.stdout.is_empty() => {
            sink.write(test_name, "logcat", "txt", output.stdout_text().as_bytes())
        }
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, "logcat dump failed");
            None
        }
    };

    if let Err(e) = bridge.run(serial, &["logcat", "-c"]).await {
        tracing::debug!(error = %e, "logcat clear failed");
    }

    saved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::fake::ScriptedBridge;
    use crate::bridge::CommandOutput;
    use crate::common::Error;

    fn device_bridge() -> ScriptedBridge {
        ScriptedBridge::new(|argv| {
            let out = if argv.iter().any(|a| a == "screencap") {
                CommandOutput::ok(b"\x89PNG fake".to_vec())
            } else if argv.iter().any(|a| a == "-d") {
                CommandOutput::ok("I/ActivityManager: start\n")
            } else {
                CommandOutput::ok("")
            };
            Ok(out)
        })
    }

    #[tokio::test]
    async fn test_capture_without_driver_uses_bridge() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ArtifactSink::new(dir.path());
        let bridge = device_bridge();
        let ctx = FailureContext {
            bridge: &bridge,
            serial: Some("EMU1"),
            driver: None,
            logcat_lines: 50,
        };

        let saved = capture_failure(&sink, "smoke::launch", &ctx).await;

        assert_eq!(saved.len(), 2);
        assert!(dir.path().join("smoke__launch-adb_screenshot.png").is_file());
        let log = std::fs::read_to_string(dir.path().join("smoke__launch-logcat.txt")).unwrap();
        assert!(log.contains("ActivityManager"));

        let calls = bridge.calls();
        assert_eq!(calls[1], vec!["-s", "EMU1", "logcat", "-d", "-t", "50"]);
        assert_eq!(calls.last().unwrap(), &vec!["-s", "EMU1", "logcat", "-c"]);
    }

    #[tokio::test]
    async fn test_logcat_cleared_even_when_dump_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ArtifactSink::new(dir.path());
        let bridge = ScriptedBridge::new(|argv| {
            if argv.iter().any(|a| a == "-d") {
                Err(Error::Internal("device vanished".into()))
            } else {
                Ok(CommandOutput::default())
            }
        });

        let saved = capture_logcat(&sink, "t", &bridge, None, 2000).await;

        assert!(saved.is_none());
        assert_eq!(bridge.count_containing("-c"), 1);
    }

    #[tokio::test]
    async fn test_empty_screencap_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ArtifactSink::new(dir.path());
        let bridge = ScriptedBridge::new(|_| Ok(CommandOutput::ok(Vec::new())));

        assert!(capture_bridge_screenshot(&sink, "t", &bridge, None).await.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
