//! CLI command definitions
//!
//! Defines the clap commands for the droid-e2e CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// List connected devices, one identifier per line
    Devices,

    /// Print the only connected device; fails when there are none or several
    Pick,

    /// Wait until a device reports a completed boot
    WaitBoot {
        /// Device serial (default: $ANDROID_SERIAL, $UDID, the only connected
        /// device, or adb's default target)
        #[arg(long, short)]
        serial: Option<String>,

        /// Seconds to wait before giving up (default: boot.timeout_secs)
        #[arg(long)]
        timeout: Option<u64>,

        /// Seconds between property polls (default: boot.poll_interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Open an automation session, report where the app is, and close it
    Session {
        /// Device serial
        #[arg(long, short)]
        serial: Option<String>,
    },

    /// Save a device screenshot and logcat into the results directory
    Capture {
        /// Name the artifact files are prefixed with
        #[arg(long, short)]
        name: String,

        /// Device serial
        #[arg(long, short)]
        serial: Option<String>,
    },

    /// Write environment.properties into the results directory
    EnvFile,

    /// Execute API test scenarios defined in YAML files
    Test {
        /// Paths to the YAML test scenario files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Run against the live API instead of the mock
        #[arg(long)]
        live: bool,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,
    },

    /// Serve the ReqRes mock in the foreground
    MockServer {
        /// Port to listen on (default: any free port)
        #[arg(long, short, default_value = "0")]
        port: u16,
    },
}
