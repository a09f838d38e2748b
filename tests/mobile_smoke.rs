//! Device-backed smoke tests
//!
//! Need a booted Android device (or emulator), an Appium server and the
//! demo app; configure them through `config.toml` or the usual
//! environment variables and run with `cargo test -- --ignored`.

use std::future::Future;
use std::time::Duration;

use droid_e2e::bridge::Adb;
use droid_e2e::session::{with_session, RemoteSession};
use droid_e2e::{Config, Error, Result};

const CLICKABLE: &str = "new UiSelector().clickable(true)";

fn config() -> Config {
    Config::load().expect("Failed to load configuration")
}

/// Poll `check` until it yields a non-empty string or `timeout` passes
async fn wait_for_text<F, Fut>(timeout: Duration, mut check: F) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match check().await {
            Ok(text) if !text.is_empty() => return Ok(text),
            Ok(_) | Err(_) if tokio::time::Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            Ok(_) => return Err(Error::TestAssertion("Timed out waiting".to_string())),
            Err(e) => return Err(e),
        }
    }
}

#[tokio::test]
#[ignore = "requires an Android device and Appium server"]
async fn test_launch_main_activity() {
    let config = config();
    let adb = Adb::from_config(&config.bridge);
    let expected_package = config.session.app_package.clone();

    with_session(&config, &adb, "launch_main_activity", |driver| async move {
        let activity =
            wait_for_text(Duration::from_secs(15), || driver.current_activity()).await?;
        let package = driver.current_package().await?;
        tracing::info!(%activity, %package, "App launched");

        if package != expected_package {
            return Err(Error::TestAssertion(format!(
                "Expected package {}, got {}",
                expected_package, package
            )));
        }
        Ok(())
    })
    .await
    .unwrap();
}

/// Clickable elements, re-activating the app once if the server lost it
async fn find_clickables(driver: &RemoteSession) -> Result<Vec<droid_e2e::session::ElementId>> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match driver.find_elements_uiautomator(CLICKABLE).await {
            Ok(elements) if !elements.is_empty() => return Ok(elements),
            Ok(_) if attempts < 2 => tokio::time::sleep(Duration::from_secs(2)).await,
            Err(e) if attempts < 2 && e.to_string().to_lowercase().contains("socket hang up") => {
                let package = driver.current_package().await?;
                driver.activate_app(&package).await?;
            }
            Ok(_) => {
                return Err(Error::TestAssertion(
                    "No clickable elements found".to_string(),
                ))
            }
            Err(e) => return Err(e),
        }
    }
}

#[tokio::test]
#[ignore = "requires an Android device and Appium server"]
async fn test_ui_interactions() {
    let config = config();
    let adb = Adb::from_config(&config.bridge);

    with_session(&config, &adb, "ui_interactions", |driver| async move {
        let elements = find_clickables(&driver).await?;
        driver.click(&elements[0]).await?;

        let package = driver.current_package().await?;
        let state = driver.query_app_state(&package).await?;
        if !state.is_running() {
            return Err(Error::TestAssertion(format!(
                "Unexpected app state: {:?}",
                state
            )));
        }
        Ok(())
    })
    .await
    .unwrap();
}

#[tokio::test]
#[ignore = "requires an Android device and Appium server"]
async fn test_background_recovery() {
    let config = config();
    let adb = Adb::from_config(&config.bridge);

    with_session(&config, &adb, "background_recovery", |driver| async move {
        driver.background_app(Duration::from_secs(2)).await?;
        wait_for_text(Duration::from_secs(10), || driver.current_activity()).await?;
        Ok(())
    })
    .await
    .unwrap();
}
