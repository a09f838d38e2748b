//! CLI command handling
//!
//! Dispatches CLI commands to the bridge, session and API layers and
//! formats output.

use std::net::SocketAddr;
use std::time::Duration;

use colored::Colorize;

use crate::api;
use crate::artifacts::{
    capture_bridge_screenshot, capture_logcat, write_environment_file, ArtifactSink,
    EnvironmentInfo,
};
use crate::bridge::{
    list_connected_devices, pick_udid_from_devices, wait_for_boot, Adb, BootWait,
};
use crate::commands::Commands;
use crate::common::{paths, Config, Error, Result};
use crate::session::{resolve_udid, DeviceSession};
use crate::testing::{self, TestResult};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: Config) -> Result<()> {
    let adb = Adb::from_config(&config.bridge);

    match command {
        Commands::Devices => {
            for serial in list_connected_devices(&adb).await? {
                println!("{}", serial);
            }
            Ok(())
        }

        Commands::Pick => {
            let udid = resolve_udid(&adb, None).await?;
            println!("{}", udid);
            Ok(())
        }

        Commands::WaitBoot {
            serial,
            timeout,
            interval,
        } => {
            // Without a serial, target the only device; adb picks otherwise
            let serial = match serial.or_else(|| config.device.serial.clone()) {
                Some(serial) => Some(serial),
                None => pick_udid_from_devices(&adb).await?,
            };
            let mut wait = BootWait::from_config(&config.boot);
            if let Some(secs) = timeout {
                wait.timeout = Duration::from_secs(secs);
            }
            if let Some(secs) = interval {
                wait.poll_interval = Duration::from_secs(secs);
            }

            wait_for_boot(&adb, serial.as_deref(), &wait).await?;
            println!(
                "Device {} booted",
                serial.as_deref().unwrap_or("<default>")
            );
            Ok(())
        }

        Commands::Session { serial } => {
            let mut config = config;
            if serial.is_some() {
                config.device.serial = serial;
            }

            let session = DeviceSession::open(&config, &adb).await?;
            let driver = session.driver();
            println!("Session:  {}", driver.id());
            println!("Device:   {}", session.udid());

            let report = async {
                println!("Activity: {}", driver.current_activity().await?);
                println!("Package:  {}", driver.current_package().await?);
                Ok::<_, Error>(())
            }
            .await;

            session.close().await;
            report
        }

        Commands::Capture { name, serial } => {
            let serial = serial.or_else(|| config.device.serial.clone());
            let dir = results_dir(&config)?;
            let sink = ArtifactSink::new(dir);

            let mut saved = Vec::new();
            saved.extend(capture_bridge_screenshot(&sink, &name, &adb, serial.as_deref()).await);
            saved.extend(
                capture_logcat(
                    &sink,
                    &name,
                    &adb,
                    serial.as_deref(),
                    config.artifacts.logcat_lines,
                )
                .await,
            );

            if saved.is_empty() {
                return Err(Error::Internal(
                    "Nothing captured; is a device connected?".to_string(),
                ));
            }
            for path in &saved {
                println!("Saved {}", path.display());
            }
            Ok(())
        }

        Commands::EnvFile => {
            let dir = results_dir(&config)?;
            let info = EnvironmentInfo::collect(&config);
            match write_environment_file(&dir, &info) {
                Some(path) => {
                    println!("Wrote {}", path.display());
                    Ok(())
                }
                None => Err(Error::Internal(format!(
                    "Could not write environment file in {}",
                    dir.display()
                ))),
            }
        }

        Commands::Test {
            paths,
            live,
            verbose,
        } => {
            let mut api_config = config.api.clone();
            if live {
                api_config.use_mock = false;
            }
            let sink = ArtifactSink::new(config.results_dir());

            let mut results = Vec::with_capacity(paths.len());
            for path in &paths {
                let result =
                    testing::run_scenario(path, &api_config, Some(&sink), verbose).await?;
                results.push(result);
            }

            print_summary(&results);

            // Report metadata accompanies every run with a results directory
            if let Some(dir) = &config.artifacts.results_dir {
                write_environment_file(dir, &EnvironmentInfo::collect(&config));
            }

            let failed = results
                .iter()
                .filter(|r| !r.passed && r.skipped.is_none())
                .count();
            if failed > 0 {
                return Err(Error::TestAssertion(format!(
                    "{} of {} scenarios failed",
                    failed,
                    results.len()
                )));
            }
            Ok(())
        }

        Commands::MockServer { port } => {
            api::mock::serve(SocketAddr::from(([127, 0, 0, 1], port))).await
        }
    }
}

/// Configured results directory, created if missing
fn results_dir(config: &Config) -> Result<std::path::PathBuf> {
    let dir = config.results_dir();
    paths::ensure_dir(&dir)?;
    Ok(dir)
}

fn print_summary(results: &[TestResult]) {
    if results.len() < 2 {
        return;
    }

    println!("{}", "Summary:".cyan());
    for result in results {
        let (mark, detail) = match (&result.skipped, result.passed) {
            (Some(reason), _) => ("-".yellow(), reason.clone()),
            (None, true) => ("✓".green(), format!("{} steps", result.steps_total)),
            (None, false) => (
                "✗".red(),
                format!(
                    "step {}/{}: {}",
                    result.steps_run,
                    result.steps_total,
                    result.error.as_deref().unwrap_or("failed")
                ),
            ),
        };
        println!("  {} {} ({})", mark, result.name, detail.dimmed());
    }
}
