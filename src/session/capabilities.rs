//! Session capabilities
//!
//! Builds the capability set sent when the remote session is created.
//! Keys outside the W3C standard set get the `appium:` vendor prefix.

use serde_json::{json, Map, Value};
use std::path::Path;

use crate::common::config::SessionConfig;

/// Device name reported when none is configured
pub const DEFAULT_DEVICE_NAME: &str = "Android Emulator";

const W3C_KEYS: &[&str] = &[
    "platformName",
    "browserName",
    "browserVersion",
    "acceptInsecureCerts",
    "pageLoadStrategy",
    "proxy",
    "setWindowRect",
    "timeouts",
    "unhandledPromptBehavior",
    "strictFileInteractability",
];

const VENDOR_PREFIX: &str = "appium:";

/// Capability set for one remote session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    map: Map<String, Value>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capabilities for the Android app under test, driven by UiAutomator2
    pub fn android(
        config: &SessionConfig,
        device_name: Option<&str>,
        udid: Option<&str>,
        app: Option<&Path>,
    ) -> Self {
        let mut caps = Self::new();
        caps.set("platformName", "Android");
        caps.set("automationName", "UiAutomator2");
        caps.set("deviceName", device_name.unwrap_or(DEFAULT_DEVICE_NAME));
        if let Some(udid) = udid.filter(|u| !u.is_empty()) {
            caps.set("udid", udid);
        }
        if let Some(app) = app {
            caps.set("app", app.display().to_string());
        }
        caps.set("autoGrantPermissions", true);

        caps.set("appPackage", config.app_package.as_str());
        caps.set("appActivity", config.app_activity.as_str());
        caps.set("appWaitActivity", config.app_wait_activity.as_str());

        // Slow emulators on CI need generous server-side timeouts
        caps.set("newCommandTimeout", config.new_command_timeout_secs);
        caps.set("adbExecTimeout", 120_000);
        caps.set("uiautomator2ServerInstallTimeout", 120_000);
        caps.set("uiautomator2ServerLaunchTimeout", 120_000);

        caps.set("ignoreHiddenApiPolicyError", true);
        caps.set("noReset", true);
        caps.set("disableWindowAnimation", true);
        caps
    }

    /// Set a capability, adding the vendor prefix where required
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.map.insert(qualify(key), value.into());
        self
    }

    /// Look up a capability by its unprefixed name
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(&qualify(key))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Request body for `POST /session`
    pub fn to_new_session_body(&self) -> Value {
        json!({
            "capabilities": {
                "alwaysMatch": Value::Object(self.map.clone()),
                "firstMatch": [{}],
            }
        })
    }
}

fn qualify(key: &str) -> String {
    if W3C_KEYS.contains(&key) || key.contains(':') {
        key.to_string()
    } else {
        format!("{VENDOR_PREFIX}{key}")
    }
}
