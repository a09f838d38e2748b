//! Error types for droid-e2e
//!
//! Messages are written to be read in a failed test log, with a hint on
//! how to resolve the common cases.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for droid-e2e
#[derive(Error, Debug)]
pub enum Error {
    // === Device Bridge Errors ===
    #[error("Device bridge '{}' could not be started: {source}. Install platform-tools or set ADB", .program.display())]
    BridgeUnavailable {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Android device did not finish booting within {0} seconds")]
    BootTimeout(u64),

    // === Device Selection Errors ===
    #[error("No Android devices or emulators connected ('adb devices' is empty)")]
    NoDevices,

    #[error("Multiple devices connected ({}). Set ANDROID_SERIAL to pick one", .0.join(", "))]
    AmbiguousDevices(Vec<String>),

    // === Remote Session Errors ===
    #[error("Could not create automation session: {0}")]
    SessionNotCreated(String),

    #[error("WebDriver command '{command}' failed: {message}")]
    WebDriver { command: String, message: String },

    // === HTTP Errors ===
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Test Errors ===
    #[error("Test assertion failed: {0}")]
    TestAssertion(String),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a bridge-unavailable error for the given executable
    pub fn bridge_unavailable(program: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::BridgeUnavailable {
            program: program.into(),
            source,
        }
    }

    /// Create a WebDriver command error
    pub fn webdriver(command: &str, message: impl Into<String>) -> Self {
        Self::WebDriver {
            command: command.to_string(),
            message: message.into(),
        }
    }

    /// True when the device never reported a completed boot.
    ///
    /// Lets callers treat the boot wait as advisory without also
    /// swallowing a missing `adb`.
    pub fn is_boot_timeout(&self) -> bool {
        matches!(self, Self::BootTimeout(_))
    }
}
