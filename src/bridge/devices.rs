//! Device enumeration
//!
//! Parses `adb devices` and keeps the devices that are ready to talk to.

use super::runner::Bridge;
use crate::common::Result;

/// State column value of a connected, authorized device
const READY_STATE: &str = "device";

/// Extract ready device serials from `adb devices` output
///
/// The first line is the `List of devices attached` header. Rows are
/// `<serial>\t<state>`; anything with another state (`offline`,
/// `unauthorized`, `no permissions`, ...) or another shape is dropped.
/// Bridge order is preserved.
pub fn parse_devices(output: &str) -> Vec<String> {
    output
        .trim()
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.trim().split('\t').collect();
            match parts.as_slice() {
                [serial, state] if *state == READY_STATE => Some(serial.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// List serials of connected devices in the ready state
///
/// An empty list is not an error. Failure to spawn the bridge is
/// returned unchanged.
pub async fn list_connected_devices(bridge: &dyn Bridge) -> Result<Vec<String>> {
    let output = bridge.run(None, &["devices"]).await?;
    let devices = parse_devices(&output.stdout_text());
    tracing::debug!(?devices, "connected devices");
    Ok(devices)
}

/// The serial of the only connected device, if there is exactly one
///
/// Zero or several devices both give `None`; what that means is up to
/// the caller.
pub async fn pick_udid_from_devices(bridge: &dyn Bridge) -> Result<Option<String>> {
    let mut devices = list_connected_devices(bridge).await?;
    if devices.len() == 1 {
        Ok(devices.pop())
    } else {
        Ok(None)
    }
}
