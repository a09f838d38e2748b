//! Per-test device session lifecycle
//!
//! Setup picks the device, waits for it to boot, and opens the remote
//! session. Teardown always deletes the session, whatever the test did.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::json;

use super::capabilities::Capabilities;
use super::webdriver::RemoteSession;
use crate::artifacts::{capture_failure, ArtifactSink, FailureContext};
use crate::bridge::{list_connected_devices, wait_for_boot, Bridge, BootWait};
use crate::common::{Config, Error, Result};

/// A device with an open automation session
#[derive(Debug)]
pub struct DeviceSession {
    udid: String,
    driver: RemoteSession,
}

impl DeviceSession {
    /// Run the full setup sequence
    pub async fn open(config: &Config, bridge: &dyn Bridge) -> Result<Self> {
        let app = resolve_app(config)?;
        let udid = resolve_udid(bridge, config.device.serial.as_deref()).await?;

        let wait = BootWait::from_config(&config.boot);
        match wait_for_boot(bridge, Some(&udid), &wait).await {
            Ok(()) => {}
            Err(e) if e.is_boot_timeout() && config.boot.best_effort => {
                tracing::warn!(udid = %udid, error = %e, "Boot wait failed; continuing because boot.best_effort is set");
            }
            Err(e) => return Err(e),
        }

        let caps = Capabilities::android(
            &config.session,
            config.device.name.as_deref(),
            Some(&udid),
            app.as_deref(),
        );
        let driver = RemoteSession::create(&config.session.server_url, &caps).await?;

        let implicit = Duration::from_secs(config.session.implicit_wait_secs);
        if let Err(e) = driver.set_implicit_wait(implicit).await {
            tracing::warn!(error = %e, "Could not set implicit wait");
        }
        if let Err(e) = driver.update_settings(driver_settings()).await {
            tracing::warn!(error = %e, "Could not update driver settings");
        }

        Ok(Self { udid, driver })
    }

    pub fn udid(&self) -> &str {
        &self.udid
    }

    pub fn driver(&self) -> &RemoteSession {
        &self.driver
    }

    /// Delete the remote session; errors are logged, not returned
    pub async fn close(self) {
        if let Err(e) = self.driver.quit().await {
            tracing::warn!(session = %self.driver.id(), error = %e, "Session teardown failed");
        }
    }
}

/// Settings applied to UiAutomator2 right after the session starts
fn driver_settings() -> serde_json::Value {
    json!({
        "waitForIdleTimeout": 0,
        "waitForSelectorTimeout": 15000,
        "actionAcknowledgmentTimeout": 200,
    })
}

/// The app package must exist when one is configured
fn resolve_app(config: &Config) -> Result<Option<PathBuf>> {
    match &config.session.app {
        None => Ok(None),
        Some(app) => {
            let app = app.canonicalize().map_err(|_| {
                Error::Config(format!("APK not found at: {}", app.display()))
            })?;
            Ok(Some(app))
        }
    }
}

/// Pick the device serial
///
/// An explicitly configured serial is used as-is. Otherwise exactly one
/// connected device is required: none or several is an error here, unlike
/// in [`crate::bridge::pick_udid_from_devices`].
pub async fn resolve_udid(bridge: &dyn Bridge, configured: Option<&str>) -> Result<String> {
    if let Some(serial) = configured.filter(|s| !s.is_empty()) {
        return Ok(serial.to_string());
    }

    let mut devices = list_connected_devices(bridge).await?;
    match devices.len() {
        0 => Err(Error::NoDevices),
        1 => Ok(devices.remove(0)),
        _ => Err(Error::AmbiguousDevices(devices)),
    }
}

/// Run `body` inside a device session
///
/// On failure the device's screenshot, page source and logcat are saved
/// under the results directory. A panicking body counts as a failure and
/// the panic is resumed after teardown. The session is deleted in every
/// case and the body's result is returned unchanged.
pub async fn with_session<F, Fut, T>(
    config: &Config,
    bridge: &dyn Bridge,
    test_name: &str,
    body: F,
) -> Result<T>
where
    F: FnOnce(RemoteSession) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let session = DeviceSession::open(config, bridge).await?;
    let outcome = AssertUnwindSafe(body(session.driver.clone()))
        .catch_unwind()
        .await;

    let failure = match &outcome {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(payload) => Some(format!("panicked: {}", panic_message(payload.as_ref()))),
    };

    if let Some(reason) = failure {
        tracing::error!(test = test_name, error = %reason, "Test failed; capturing artifacts");
        let sink = ArtifactSink::new(config.results_dir());
        let ctx = FailureContext {
            bridge,
            serial: Some(session.udid()),
            driver: Some(session.driver()),
            logcat_lines: config.artifacts.logcat_lines,
        };
        capture_failure(&sink, test_name, &ctx).await;
    }

    session.close().await;
    match outcome {
        Ok(result) => result,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::fake::ScriptedBridge;
    use crate::bridge::CommandOutput;

    fn devices(output: &'static str) -> ScriptedBridge {
        ScriptedBridge::new(move |_| Ok(CommandOutput::ok(output)))
    }

    #[tokio::test]
    async fn test_configured_serial_skips_enumeration() {
        let bridge = devices("List of devices attached\n");
        let udid = resolve_udid(&bridge, Some("emulator-5554")).await.unwrap();
        assert_eq!(udid, "emulator-5554");
        assert!(bridge.calls().is_empty());
    }

    #[tokio::test]
    async fn test_single_device_is_selected() {
        let bridge = devices("List of devices attached\nEMU1\tdevice\nEMU2\tunauthorized\n");
        assert_eq!(resolve_udid(&bridge, None).await.unwrap(), "EMU1");
    }

    #[tokio::test]
    async fn test_no_devices_fails_loudly() {
        let bridge = devices("List of devices attached\n");
        let err = resolve_udid(&bridge, Some("")).await.unwrap_err();
        assert!(matches!(err, Error::NoDevices));
    }

    #[tokio::test]
    async fn test_multiple_devices_fail_loudly() {
        let bridge = devices("List of devices attached\nA\tdevice\nB\tdevice\n");
        match resolve_udid(&bridge, None).await.unwrap_err() {
            Error::AmbiguousDevices(found) => assert_eq!(found, vec!["A", "B"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_app_is_config_error() {
        let mut config = Config::default();
        config.session.app = Some(PathBuf::from("/no/such/app.apk"));
        let err = resolve_app(&config).unwrap_err();
        assert!(err.to_string().contains("APK not found"));
    }

    #[test]
    fn test_panic_message() {
        let literal: Box<dyn Any + Send> = Box::new("tap failed");
        assert_eq!(panic_message(literal.as_ref()), "tap failed");

        let formatted: Box<dyn Any + Send> = Box::new(format!("step {}", 3));
        assert_eq!(panic_message(formatted.as_ref()), "step 3");

        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(other.as_ref()), "<non-string panic>");
    }
}
