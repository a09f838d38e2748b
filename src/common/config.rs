//! Configuration file handling
//!
//! Settings come from `config.toml` in the platform config directory and
//! are then overridden by the environment variables the suite has always
//! honoured (`ANDROID_SERIAL`, `APPIUM_SERVER_URL`, `REQRES_*`, ...).

use serde::Deserialize;
use std::path::PathBuf;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Device bridge settings
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Device selection
    #[serde(default)]
    pub device: DeviceConfig,

    /// Boot readiness settings
    #[serde(default)]
    pub boot: BootConfig,

    /// Remote automation session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Failure artifact settings
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

/// Device bridge configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct BridgeConfig {
    /// Explicit path to the adb executable
    pub adb_path: Option<PathBuf>,
}

/// Device selection
#[derive(Debug, Deserialize, Default, Clone)]
pub struct DeviceConfig {
    /// Serial of the device to use; discovered when absent
    pub serial: Option<String>,

    /// Human-readable device name reported to the automation server
    pub name: Option<String>,
}

/// Boot readiness settings
#[derive(Debug, Deserialize, Clone)]
pub struct BootConfig {
    /// Seconds to wait for the device to finish booting
    #[serde(default = "default_boot_timeout")]
    pub timeout_secs: u64,

    /// Seconds between property polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Continue session setup when the boot wait fails
    #[serde(default = "default_true")]
    pub best_effort: bool,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_boot_timeout(),
            poll_interval_secs: default_poll_interval(),
            best_effort: true,
        }
    }
}

fn default_boot_timeout() -> u64 {
    240
}
fn default_poll_interval() -> u64 {
    2
}
fn default_true() -> bool {
    true
}

/// Remote automation session settings
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Appium server base URL
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Path to the application package under test
    pub app: Option<PathBuf>,

    #[serde(default = "default_app_package")]
    pub app_package: String,

    #[serde(default = "default_app_activity")]
    pub app_activity: String,

    #[serde(default = "default_app_wait_activity")]
    pub app_wait_activity: String,

    /// Server-side idle timeout for the session
    #[serde(default = "default_new_command_timeout")]
    pub new_command_timeout_secs: u64,

    /// Implicit element wait applied after the session is created
    #[serde(default = "default_implicit_wait")]
    pub implicit_wait_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            app: None,
            app_package: default_app_package(),
            app_activity: default_app_activity(),
            app_wait_activity: default_app_wait_activity(),
            new_command_timeout_secs: default_new_command_timeout(),
            implicit_wait_secs: default_implicit_wait(),
        }
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:4723".to_string()
}
fn default_app_package() -> String {
    "com.saucelabs.mydemoapp.android".to_string()
}
fn default_app_activity() -> String {
    "com.saucelabs.mydemoapp.android.view.activities.SplashActivity".to_string()
}
fn default_app_wait_activity() -> String {
    "com.saucelabs.mydemoapp.android.view.activities.*".to_string()
}
fn default_new_command_timeout() -> u64 {
    120
}
fn default_implicit_wait() -> u64 {
    5
}

/// REST API settings
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: f64,

    /// Honour system proxy environment variables
    #[serde(default)]
    pub trust_env: bool,

    /// Report proxy-blocked responses as skipped instead of failed
    #[serde(default = "default_true")]
    pub skip_on_proxy: bool,

    /// Serve requests from the in-process mock instead of the live API
    #[serde(default = "default_true")]
    pub use_mock: bool,

    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Option<String>,
    pub bearer_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_api_timeout(),
            trust_env: false,
            skip_on_proxy: true,
            use_mock: true,
            http_proxy: None,
            https_proxy: None,
            no_proxy: None,
            bearer_token: None,
        }
    }
}

fn default_base_url() -> String {
    "https://reqres.in".to_string()
}
fn default_api_timeout() -> f64 {
    15.0
}

/// Failure artifact settings
#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactsConfig {
    /// Directory receiving screenshots, logcat dumps and report metadata
    pub results_dir: Option<PathBuf>,

    /// Number of logcat lines dumped on failure
    #[serde(default = "default_logcat_lines")]
    pub logcat_lines: u32,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            results_dir: None,
            logcat_lines: default_logcat_lines(),
        }
    }
}

fn default_logcat_lines() -> u32 {
    2000
}

impl Config {
    /// Load configuration from the default config file, then apply
    /// environment overrides
    ///
    /// Returns default configuration if the file doesn't exist
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    }
                })?;
                return Self::from_toml(&content);
            }
        }
        Ok(Self::default())
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Apply environment overrides using the given lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(path) = var("ADB") {
            self.bridge.adb_path = Some(PathBuf::from(path));
        }

        // ANDROID_SERIAL wins over UDID
        if let Some(serial) = var("ANDROID_SERIAL").or_else(|| var("UDID")) {
            self.device.serial = Some(serial);
        }
        if let Some(name) = var("DEVICE_NAME") {
            self.device.name = Some(name);
        }

        if let Some(url) = var("APPIUM_SERVER_URL") {
            self.session.server_url = url;
        }

        if let Some(url) = var("REQRES_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(timeout) = var("REQRES_TIMEOUT").and_then(|v| v.parse::<f64>().ok()) {
            self.api.timeout_secs = timeout;
        }
        if let Some(flag) = var("REQRES_TRUST_ENV") {
            self.api.trust_env = parse_flag(&flag);
        }
        if let Some(flag) = var("REQRES_SKIP_ON_PROXY") {
            self.api.skip_on_proxy = parse_flag(&flag);
        }
        if let Some(flag) = var("REQRES_USE_MOCK") {
            self.api.use_mock = parse_flag(&flag);
        }
        if let Some(proxy) = var("REQRES_HTTP_PROXY") {
            self.api.http_proxy = Some(proxy);
        }
        if let Some(proxy) = var("REQRES_HTTPS_PROXY") {
            self.api.https_proxy = Some(proxy);
        }
        if let Some(list) = var("REQRES_NO_PROXY") {
            self.api.no_proxy = Some(list);
        }
        if let Some(token) = var("REQRES_BEARER_TOKEN") {
            self.api.bearer_token = Some(token);
        }

        if let Some(dir) = var("DROID_E2E_RESULTS_DIR") {
            self.artifacts.results_dir = Some(PathBuf::from(dir));
        }
    }

    /// Results directory, falling back to the platform data directory
    pub fn results_dir(&self) -> PathBuf {
        self.artifacts
            .results_dir
            .clone()
            .unwrap_or_else(super::paths::default_results_dir)
    }
}

/// Interpret `1`, `true` and `yes` (any case) as true
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.boot.timeout_secs, 240);
        assert_eq!(config.boot.poll_interval_secs, 2);
        assert!(config.boot.best_effort);
        assert_eq!(config.session.server_url, "http://127.0.0.1:4723");
        assert_eq!(config.api.base_url, "https://reqres.in");
        assert!(config.api.use_mock);
        assert!(!config.api.trust_env);
        assert_eq!(config.artifacts.logcat_lines, 2000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
[boot]
timeout_secs = 60
best_effort = false

[api]
use_mock = false
"#,
        )
        .unwrap();
        assert_eq!(config.boot.timeout_secs, 60);
        assert_eq!(config.boot.poll_interval_secs, 2);
        assert!(!config.boot.best_effort);
        assert!(!config.api.use_mock);
        assert!(config.api.skip_on_proxy);
    }

    #[test]
    fn test_invalid_toml_is_config_parse_error() {
        let err = Config::from_toml("[boot\ntimeout_secs = ").unwrap_err();
        assert!(matches!(err, crate::Error::ConfigParse(_)));
    }

    #[test]
    fn test_android_serial_wins_over_udid() {
        let mut config = Config::default();
        config.apply_env(env(&[("ANDROID_SERIAL", "emulator-5554"), ("UDID", "R58M")]));
        assert_eq!(config.device.serial.as_deref(), Some("emulator-5554"));

        let mut config = Config::default();
        config.apply_env(env(&[("UDID", "R58M")]));
        assert_eq!(config.device.serial.as_deref(), Some("R58M"));
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = Config::default();
        config.device.serial = Some("from-file".into());
        config.apply_env(env(&[("ANDROID_SERIAL", ""), ("APPIUM_SERVER_URL", "")]));
        assert_eq!(config.device.serial.as_deref(), Some("from-file"));
        assert_eq!(config.session.server_url, "http://127.0.0.1:4723");
    }

    #[test]
    fn test_reqres_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("REQRES_BASE_URL", "http://localhost:9000"),
            ("REQRES_TIMEOUT", "3.5"),
            ("REQRES_USE_MOCK", "no"),
            ("REQRES_TRUST_ENV", "YES"),
            ("REQRES_BEARER_TOKEN", "abc"),
        ]));
        assert_eq!(config.api.base_url, "http://localhost:9000");
        assert_eq!(config.api.timeout_secs, 3.5);
        assert!(!config.api.use_mock);
        assert!(config.api.trust_env);
        assert_eq!(config.api.bearer_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("True"));
        assert!(parse_flag(" yes "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("on"));
    }
}
