//! Logging and tracing configuration
//!
//! Console logging for every command, plus a plain-text run log in the
//! results directory when one is in use.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths;

/// Build the filter from `RUST_LOG`, falling back to `LOG_LEVEL`
///
/// Default level is INFO for this crate, WARN for dependencies.
fn build_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL")
            .ok()
            .map(|l| l.trim().to_ascii_lowercase())
            .filter(|l| matches!(l.as_str(), "trace" | "debug" | "info" | "warn" | "error"))
            .unwrap_or_else(|| "info".to_string());
        EnvFilter::new(format!("droid_e2e={level},warn"))
    })
}

/// Initialize tracing for the CLI
///
/// When `results_dir` is given, logs are also appended to
/// `droid-e2e.log` inside it. The returned guard flushes that file and
/// must be held until exit.
pub fn init_cli(results_dir: Option<&Path>) -> Option<WorkerGuard> {
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let file_writer = results_dir.and_then(|dir| match paths::ensure_dir(dir) {
        Ok(dir) => Some(tracing_appender::rolling::never(dir, paths::LOG_FILE)),
        Err(e) => {
            eprintln!("Warning: Could not create results directory: {}", e);
            None
        }
    });

    match file_writer {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true);

            tracing_subscriber::registry()
                .with(build_filter())
                .with(console_layer)
                .with(file_layer)
                .init();

            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(build_filter())
                .with(console_layer)
                .init();
            None
        }
    }
}
