//! Android device bridge
//!
//! Thin layer over the `adb` command-line tool: device enumeration and
//! boot readiness. All device access goes through the [`Bridge`] trait so
//! the polling logic can be exercised without hardware.

pub mod boot;
pub mod devices;
mod runner;

#[cfg(test)]
pub(crate) mod fake;

pub use boot::{wait_for_boot, BootProps, BootWait};
pub use devices::{list_connected_devices, parse_devices, pick_udid_from_devices};
pub use runner::{build_args, resolve_adb_path, Adb, Bridge, CommandOutput};
