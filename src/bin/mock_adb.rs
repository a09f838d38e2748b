//! Mock adb binary for integration testing
//!
//! Answers the handful of adb commands the CLI issues, driven by
//! environment variables, so device flows can be tested without an
//! emulator:
//!
//! - `MOCK_ADB_DEVICES`: full output of `adb devices`
//! - `MOCK_ADB_BOOT_AFTER`: the boot completes on this `sys.boot_completed`
//!   poll (default 1; `never` keeps the device booting forever)
//! - `MOCK_ADB_STATE_DIR`: where the poll counter and `calls.log` live;
//!   every invocation appends its full argument list to the log

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let state_dir = std::env::var_os("MOCK_ADB_STATE_DIR").map(PathBuf::from);

    if let Some(dir) = &state_dir {
        log_call(dir, &args);
    }

    // Drop `-s <serial>`
    let command: Vec<&str> = match args.first().map(String::as_str) {
        Some("-s") => args.iter().skip(2).map(String::as_str).collect(),
        _ => args.iter().map(String::as_str).collect(),
    };

    let code = match command.as_slice() {
        ["devices"] => {
            let listing = std::env::var("MOCK_ADB_DEVICES")
                .unwrap_or_else(|_| "List of devices attached\n".to_string());
            print!("{}", listing);
            0
        }
        ["wait-for-device"] => 0,
        ["shell", "getprop", key] => {
            println!("{}", getprop(key, state_dir.as_deref()));
            0
        }
        ["shell", "input", "keyevent", _] => 0,
        ["exec-out", "screencap", "-p"] => {
            let mut out = std::io::stdout().lock();
            out.write_all(PNG_SIGNATURE).ok();
            out.write_all(b"mock-screen").ok();
            0
        }
        ["logcat", "-d", "-t", lines] => {
            println!("--------- beginning of main (last {})", lines);
            println!("I/ActivityManager: Displayed com.example/.MainActivity");
            0
        }
        ["logcat", "-c"] => 0,
        other => {
            eprintln!("mock_adb: unsupported command: {}", other.join(" "));
            1
        }
    };

    std::process::exit(code);
}

fn getprop(key: &str, state_dir: Option<&Path>) -> &'static str {
    match key {
        "sys.boot_completed" => {
            let polls = state_dir.map(bump_poll_counter).unwrap_or(1);
            if booted(polls) {
                "1"
            } else {
                ""
            }
        }
        "dev.bootcomplete" => {
            let polls = state_dir.map(read_poll_counter).unwrap_or(1);
            if booted(polls) {
                "1"
            } else {
                ""
            }
        }
        "init.svc.bootanim" => {
            let polls = state_dir.map(read_poll_counter).unwrap_or(1);
            if booted(polls) {
                "stopped"
            } else {
                "running"
            }
        }
        _ => "",
    }
}

fn booted(polls: u64) -> bool {
    match std::env::var("MOCK_ADB_BOOT_AFTER").ok().as_deref() {
        Some("never") => false,
        Some(n) => polls >= n.trim().parse::<u64>().unwrap_or(1),
        None => true,
    }
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("polls")
}

fn read_poll_counter(dir: &Path) -> u64 {
    fs::read_to_string(counter_path(dir))
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

fn bump_poll_counter(dir: &Path) -> u64 {
    let next = read_poll_counter(dir) + 1;
    fs::write(counter_path(dir), next.to_string()).ok();
    next
}

fn log_call(dir: &Path, args: &[String]) {
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("calls.log"))
    {
        writeln!(file, "{}", args.join(" ")).ok();
    }
}
