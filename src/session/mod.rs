//! Remote automation sessions for mobile tests
//!
//! [`DeviceSession`] is the per-test fixture; [`RemoteSession`] is the
//! WebDriver client it hands to the test body.

mod capabilities;
mod fixture;
mod webdriver;

pub use capabilities::{Capabilities, DEFAULT_DEVICE_NAME};
pub use fixture::{resolve_udid, with_session, DeviceSession};
pub use webdriver::{AppState, ElementId, RemoteSession};
