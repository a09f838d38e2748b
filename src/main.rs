//! droid-e2e - End-to-end test tooling for Android apps and REST APIs
//!
//! Finds devices over adb, waits for them to boot, drives Appium sessions
//! and runs API scenarios, from a simple command-line interface.

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use droid_e2e::common::{logging, Config};
use droid_e2e::{cli, commands};

#[derive(Parser)]
#[command(name = "droid-e2e", about = "Android and REST API end-to-end test tooling")]
#[command(version, long_about = None)]
struct Cli {
    /// Where artifacts, logs and environment.properties are written
    /// [env: DROID_E2E_RESULTS_DIR]
    #[arg(long, global = true)]
    results_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(dir) = cli.results_dir {
        config.artifacts.results_dir = Some(dir);
    }

    // Keep the guard alive so the log file is flushed on exit
    let _log_guard = logging::init_cli(config.artifacts.results_dir.as_deref());

    if let Err(e) = cli::dispatch(cli.command, config).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
