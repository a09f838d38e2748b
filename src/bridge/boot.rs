//! Boot readiness polling
//!
//! A device counts as booted only when three properties agree in the same
//! poll:
//!
//! | property             | ready value        |
//! |----------------------|--------------------|
//! | `sys.boot_completed` | `"1"`              |
//! | `dev.bootcomplete`   | `"1"` or `"true"`  |
//! | `init.svc.bootanim`  | `"stopped"`        |
//!
//! Values are compared as raw text; the property store is untyped and
//! anything else (`"2"`, `"yes"`, empty) is not ready.

use std::time::Duration;

use tokio::time::Instant;

use super::runner::Bridge;
use crate::common::config::BootConfig;
use crate::common::{Error, Result};

pub const DEFAULT_BOOT_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Key code sent once the device is up, to clear the boot overlay
pub const DISMISS_KEYCODE: &str = "82";

const PROP_SYS_BOOT_COMPLETED: &str = "sys.boot_completed";
const PROP_DEV_BOOTCOMPLETE: &str = "dev.bootcomplete";
const PROP_BOOTANIM: &str = "init.svc.bootanim";

/// One reading of the boot properties. Never reused across polls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootProps {
    pub sys_boot_completed: String,
    pub dev_bootcomplete: String,
    pub bootanim: String,
}

impl BootProps {
    /// Query the three properties, one bridge call each, in fixed order
    pub async fn read(bridge: &dyn Bridge, serial: Option<&str>) -> Result<Self> {
        Ok(Self {
            sys_boot_completed: getprop(bridge, serial, PROP_SYS_BOOT_COMPLETED).await?,
            dev_bootcomplete: getprop(bridge, serial, PROP_DEV_BOOTCOMPLETE).await?,
            bootanim: getprop(bridge, serial, PROP_BOOTANIM).await?,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.sys_boot_completed == "1"
            && matches!(self.dev_bootcomplete.as_str(), "1" | "true")
            && self.bootanim == "stopped"
    }
}

async fn getprop(bridge: &dyn Bridge, serial: Option<&str>, key: &str) -> Result<String> {
    let output = bridge.run(serial, &["shell", "getprop", key]).await?;
    Ok(output.stdout_text().trim().to_string())
}

/// Deadline and cadence for [`wait_for_boot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootWait {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for BootWait {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_BOOT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl BootWait {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn from_config(config: &BootConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }
}

/// Block until the device reports a completed boot, then dismiss the
/// boot overlay
///
/// `wait-for-device` runs first and is bounded by the same timeout; the
/// polling deadline starts once it returns. A zero timeout never polls.
/// Running out of time gives [`Error::BootTimeout`]; a bridge that cannot
/// be spawned gives [`Error::BridgeUnavailable`] instead.
pub async fn wait_for_boot(bridge: &dyn Bridge, serial: Option<&str>, wait: &BootWait) -> Result<()> {
    let timeout_secs = wait.timeout.as_secs();
    tracing::info!(
        serial = serial.unwrap_or("<default>"),
        timeout_secs,
        "Waiting for device to boot"
    );

    match tokio::time::timeout(wait.timeout, bridge.run(serial, &["wait-for-device"])).await {
        Ok(result) => {
            result?;
        }
        Err(_) => {
            tracing::warn!(timeout_secs, "Device never appeared on the bridge");
            return Err(Error::BootTimeout(timeout_secs));
        }
    }

    let start = Instant::now();
    let mut polls: u32 = 0;

    while start.elapsed() < wait.timeout {
        polls += 1;
        let props = BootProps::read(bridge, serial).await?;

        if props.is_ready() {
            bridge
                .run(serial, &["shell", "input", "keyevent", DISMISS_KEYCODE])
                .await?;
            tracing::info!(polls, elapsed_ms = start.elapsed().as_millis() as u64, "Device booted");
            return Ok(());
        }

        tracing::debug!(poll = polls, ?props, "Device still booting");
        tokio::time::sleep(wait.poll_interval).await;
    }

    Err(Error::BootTimeout(timeout_secs))
}
