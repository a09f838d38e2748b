//! Session fixture tests
//!
//! Runs `with_session` against a fake Appium server and a scripted device
//! to check setup order, teardown and failure artifacts.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{Method, Uri};
use axum::{Json, Router};
use base64::Engine;
use droid_e2e::bridge::{build_args, Bridge, CommandOutput};
use droid_e2e::session::with_session;
use droid_e2e::{Config, Error, Result};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

const SESSION_ID: &str = "4f1c2d";

/// Requests seen by the fake server, as `METHOD path`
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

async fn appium(State(rec): State<Recorder>, method: Method, uri: Uri) -> Json<Value> {
    let path = uri.path().to_string();
    rec.0.lock().unwrap().push(format!("{} {}", method, path));

    let value = if path == "/session" {
        json!({ "sessionId": SESSION_ID, "capabilities": {} })
    } else if path.ends_with("/screenshot") {
        json!(base64::engine::general_purpose::STANDARD.encode(b"\x89PNG-driver"))
    } else if path.ends_with("/source") {
        json!("<hierarchy/>")
    } else if path.ends_with("/current_activity") {
        json!(".MainActivity")
    } else {
        Value::Null
    };
    Json(json!({ "value": value }))
}

async fn start_appium() -> (SocketAddr, Recorder) {
    let rec = Recorder::default();
    let app = Router::new().fallback(appium).with_state(rec.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    (addr, rec)
}

/// One attached device that is either booted or stuck booting
struct Device {
    booted: bool,
    calls: Mutex<Vec<String>>,
}

impl Device {
    fn new(booted: bool) -> Self {
        Self {
            booted,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Bridge for Device {
    async fn run(&self, serial: Option<&str>, args: &[&str]) -> Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push(build_args(serial, args).join(" "));

        let stdout: &[u8] = match args {
            ["devices"] => b"List of devices attached\nEMU1\tdevice\n",
            ["shell", "getprop", "init.svc.bootanim"] if self.booted => b"stopped\n",
            ["shell", "getprop", "init.svc.bootanim"] => b"running\n",
            ["shell", "getprop", _] if self.booted => b"1\n",
            ["exec-out", "screencap", "-p"] => b"\x89PNG-adb",
            ["logcat", "-d", ..] => b"I/Test: hello\n",
            _ => b"",
        };
        Ok(CommandOutput::ok(stdout))
    }
}

fn config(addr: SocketAddr, results: &TempDir) -> Config {
    let mut config = Config::default();
    config.session.server_url = format!("http://{}", addr);
    config.artifacts.results_dir = Some(results.path().to_path_buf());
    config.boot.timeout_secs = 1;
    config.boot.poll_interval_secs = 1;
    config
}

fn result_files(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test]
async fn test_passing_body_closes_session_without_artifacts() {
    let (addr, server) = start_appium().await;
    let results = TempDir::new().unwrap();
    let device = Device::new(true);

    let activity = with_session(&config(addr, &results), &device, "launch", |driver| async move {
        driver.current_activity().await
    })
    .await
    .unwrap();
    assert_eq!(activity, ".MainActivity");

    let calls = server.calls();
    assert_eq!(calls[0], "POST /session");
    assert!(calls.contains(&format!("POST /session/{}/timeouts", SESSION_ID)));
    assert!(calls.contains(&format!("POST /session/{}/appium/settings", SESSION_ID)));
    assert_eq!(calls.last().unwrap(), &format!("DELETE /session/{}", SESSION_ID));

    let device_calls = device.calls();
    assert_eq!(device_calls[0], "devices");
    assert_eq!(device_calls[1], "-s EMU1 wait-for-device");
    assert_eq!(device_calls.last().unwrap(), "-s EMU1 shell input keyevent 82");

    assert!(result_files(&results).is_empty());
}

#[tokio::test]
async fn test_failing_body_captures_artifacts_and_closes_session() {
    let (addr, server) = start_appium().await;
    let results = TempDir::new().unwrap();
    let device = Device::new(true);

    let result: Result<()> = with_session(&config(addr, &results), &device, "checkout flow", |_driver| async {
        Err(Error::TestAssertion("button missing".to_string()))
    })
    .await;
    assert!(matches!(result, Err(Error::TestAssertion(_))));

    assert_eq!(
        server.calls().last().unwrap(),
        &format!("DELETE /session/{}", SESSION_ID)
    );
    assert_eq!(
        result_files(&results),
        vec![
            "checkout_flow-logcat.txt",
            "checkout_flow-page_source.xml",
            "checkout_flow-screenshot.png",
        ]
    );

    let png = std::fs::read(results.path().join("checkout_flow-screenshot.png")).unwrap();
    assert_eq!(png, b"\x89PNG-driver");

    let device_calls = device.calls();
    assert!(device_calls.contains(&"-s EMU1 logcat -d -t 2000".to_string()));
    assert_eq!(device_calls.last().unwrap(), "-s EMU1 logcat -c");
    // The driver screenshot worked, so the device was not asked for one
    assert!(!device_calls.iter().any(|c| c.contains("screencap")));
}

#[tokio::test]
async fn test_panicking_body_captures_artifacts_and_closes_session() {
    let (addr, server) = start_appium().await;
    let results = TempDir::new().unwrap();
    let config = config(addr, &results);
    let device = Arc::new(Device::new(true));

    let task_device = Arc::clone(&device);
    let joined = tokio::spawn(async move {
        with_session(&config, &*task_device, "cart badge", |driver| async move {
            let activity = driver.current_activity().await?;
            assert_eq!(activity, ".CartActivity", "badge count mismatch");
            Ok(())
        })
        .await
    })
    .await;

    let err = joined.unwrap_err();
    assert!(err.is_panic());
    let payload = err.into_panic();
    let message = payload.downcast_ref::<String>().cloned().unwrap_or_default();
    assert!(message.contains("badge count mismatch"), "panic: {}", message);

    assert_eq!(
        server.calls().last().unwrap(),
        &format!("DELETE /session/{}", SESSION_ID)
    );
    assert_eq!(
        result_files(&results),
        vec![
            "cart_badge-logcat.txt",
            "cart_badge-page_source.xml",
            "cart_badge-screenshot.png",
        ]
    );
    assert_eq!(device.calls().last().unwrap(), "-s EMU1 logcat -c");
}

#[tokio::test]
async fn test_boot_timeout_aborts_setup_when_strict() {
    let (addr, server) = start_appium().await;
    let results = TempDir::new().unwrap();
    let device = Device::new(false);

    let mut config = config(addr, &results);
    config.boot.best_effort = false;

    let result = with_session(&config, &device, "strict", |_driver| async { Ok(()) }).await;
    assert!(matches!(result, Err(Error::BootTimeout(1))));
    assert!(server.calls().is_empty());
    assert_eq!(
        device
            .calls()
            .iter()
            .filter(|c| c.contains("keyevent"))
            .count(),
        0
    );
}

#[tokio::test]
async fn test_boot_timeout_tolerated_when_best_effort() {
    let (addr, server) = start_appium().await;
    let results = TempDir::new().unwrap();
    let device = Device::new(false);

    let mut config = config(addr, &results);
    config.boot.best_effort = true;

    with_session(&config, &device, "lenient", |_driver| async { Ok(()) })
        .await
        .unwrap();
    assert_eq!(server.calls()[0], "POST /session");
    assert_eq!(
        server.calls().last().unwrap(),
        &format!("DELETE /session/{}", SESSION_ID)
    );
}

#[tokio::test]
async fn test_missing_app_fails_before_touching_device() {
    let (addr, server) = start_appium().await;
    let results = TempDir::new().unwrap();
    let device = Device::new(true);

    let mut config = config(addr, &results);
    config.session.app = Some(results.path().join("missing.apk"));

    let result = with_session(&config, &device, "no_apk", |_driver| async { Ok(()) }).await;
    match result {
        Err(Error::Config(msg)) => assert!(msg.contains("APK not found")),
        other => panic!("expected config error, got {:?}", other),
    }
    assert!(device.calls().is_empty());
    assert!(server.calls().is_empty());
}
