//! Remote automation session client
//!
//! Speaks the W3C WebDriver wire protocol (plus the Appium extension
//! endpoints the mobile tests need) to an Appium server over HTTP.

use std::time::Duration;

use base64::Engine;
use reqwest::Method;
use serde_json::{json, Value};

use super::capabilities::Capabilities;
use crate::common::{Error, Result};

/// Key under which W3C servers return element references
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Locator strategy for UiAutomator selectors
const UIAUTOMATOR_STRATEGY: &str = "-android uiautomator";

/// Reference to a UI element held by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementId(pub String);

/// Application state as reported by `query_app_state`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    NotInstalled,
    NotRunning,
    RunningInBackgroundSuspended,
    RunningInBackground,
    RunningInForeground,
}

impl AppState {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::NotInstalled),
            1 => Some(Self::NotRunning),
            2 => Some(Self::RunningInBackgroundSuspended),
            3 => Some(Self::RunningInBackground),
            4 => Some(Self::RunningInForeground),
            _ => None,
        }
    }

    /// The app process is alive, in front or behind
    pub fn is_running(&self) -> bool {
        matches!(self, Self::RunningInBackground | Self::RunningInForeground)
    }
}

/// An open session on the automation server
///
/// Cheap to clone; clones share the HTTP connection pool and talk to the
/// same server-side session.
#[derive(Debug, Clone)]
pub struct RemoteSession {
    http: reqwest::Client,
    server_url: String,
    id: String,
}

impl RemoteSession {
    /// Create a new session (`POST /session`)
    pub async fn create(server_url: &str, caps: &Capabilities) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("droid-e2e/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()?;
        let server_url = server_url.trim_end_matches('/').to_string();

        tracing::info!(server = %server_url, "Creating automation session");
        let response = http
            .post(format!("{}/session", server_url))
            .json(&caps.to_new_session_body())
            .send()
            .await
            .map_err(|e| Error::SessionNotCreated(format!("{} unreachable: {}", server_url, e)))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::SessionNotCreated(format!("invalid response: {}", e)))?;

        if let Some(message) = error_message(&body) {
            return Err(Error::SessionNotCreated(message));
        }
        if !status.is_success() {
            return Err(Error::SessionNotCreated(format!("server returned {}", status)));
        }

        // Legacy servers put the id at the top level
        let id = body["value"]["sessionId"]
            .as_str()
            .or_else(|| body["sessionId"].as_str())
            .ok_or_else(|| Error::SessionNotCreated("response has no sessionId".to_string()))?
            .to_string();

        tracing::info!(session = %id, "Session created");
        Ok(Self {
            http,
            server_url,
            id,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Delete the session (`DELETE /session/{id}`)
    pub async fn quit(&self) -> Result<()> {
        self.command("quit", Method::DELETE, "", None).await?;
        tracing::info!(session = %self.id, "Session closed");
        Ok(())
    }

    /// Set the implicit element wait
    pub async fn set_implicit_wait(&self, wait: Duration) -> Result<()> {
        self.command(
            "timeouts",
            Method::POST,
            "/timeouts",
            Some(json!({ "implicit": wait.as_millis() as u64 })),
        )
        .await?;
        Ok(())
    }

    /// Update UiAutomator2 driver settings
    pub async fn update_settings(&self, settings: Value) -> Result<()> {
        self.command(
            "update_settings",
            Method::POST,
            "/appium/settings",
            Some(json!({ "settings": settings })),
        )
        .await?;
        Ok(())
    }

    pub async fn current_activity(&self) -> Result<String> {
        let value = self
            .command("current_activity", Method::GET, "/appium/device/current_activity", None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn current_package(&self) -> Result<String> {
        let value = self
            .command("current_package", Method::GET, "/appium/device/current_package", None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Send the app to the background for the given time, then restore it
    pub async fn background_app(&self, duration: Duration) -> Result<()> {
        self.command(
            "background_app",
            Method::POST,
            "/appium/app/background",
            Some(json!({ "seconds": duration.as_secs() })),
        )
        .await?;
        Ok(())
    }

    pub async fn activate_app(&self, app_id: &str) -> Result<()> {
        self.command(
            "activate_app",
            Method::POST,
            "/appium/device/activate_app",
            Some(json!({ "appId": app_id })),
        )
        .await?;
        Ok(())
    }

    pub async fn query_app_state(&self, app_id: &str) -> Result<AppState> {
        let value = self
            .command(
                "query_app_state",
                Method::POST,
                "/appium/device/app_state",
                Some(json!({ "appId": app_id })),
            )
            .await?;
        value
            .as_i64()
            .and_then(AppState::from_code)
            .ok_or_else(|| Error::webdriver("query_app_state", format!("unexpected state {}", value)))
    }

    /// Find all elements matching a UiAutomator selector
    pub async fn find_elements_uiautomator(&self, selector: &str) -> Result<Vec<ElementId>> {
        let value = self
            .command(
                "find_elements",
                Method::POST,
                "/elements",
                Some(json!({ "using": UIAUTOMATOR_STRATEGY, "value": selector })),
            )
            .await?;
        Ok(value
            .as_array()
            .map(|items| items.iter().filter_map(element_id).collect())
            .unwrap_or_default())
    }

    pub async fn click(&self, element: &ElementId) -> Result<()> {
        self.command(
            "click",
            Method::POST,
            &format!("/element/{}/click", element.0),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    /// Screenshot of the device screen as PNG bytes
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        let value = self.command("screenshot", Method::GET, "/screenshot", None).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| Error::webdriver("screenshot", "response is not a string"))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::webdriver("screenshot", e.to_string()))
    }

    /// XML hierarchy of the current screen
    pub async fn page_source(&self) -> Result<String> {
        let value = self.command("page_source", Method::GET, "/source", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Issue a session command and unwrap the `value` field
    async fn command(
        &self,
        name: &str,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        let url = format!("{}/session/{}{}", self.server_url, self.id, path);
        tracing::debug!(command = name, %method, %url, "WebDriver");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::webdriver(name, e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::webdriver(name, e.to_string()))?;
        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| Error::webdriver(name, e.to_string()))?
        };

        if let Some(message) = error_message(&body) {
            return Err(Error::webdriver(name, message));
        }
        if !status.is_success() {
            return Err(Error::webdriver(name, format!("server returned {}", status)));
        }

        Ok(body.get("value").cloned().unwrap_or(Value::Null))
    }
}

/// W3C error payload: `{"value": {"error": ..., "message": ...}}`
fn error_message(body: &Value) -> Option<String> {
    let value = body.get("value")?;
    let error = value.get("error")?.as_str()?;
    let message = value.get("message").and_then(Value::as_str).unwrap_or("");
    Some(if message.is_empty() {
        error.to_string()
    } else {
        format!("{}: {}", error, message)
    })
}

fn element_id(item: &Value) -> Option<ElementId> {
    item.get(ELEMENT_KEY)
        .or_else(|| item.get("ELEMENT"))
        .and_then(Value::as_str)
        .map(|id| ElementId(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message() {
        let body = json!({"value": {"error": "no such element", "message": "not found"}});
        assert_eq!(error_message(&body).unwrap(), "no such element: not found");

        let ok = json!({"value": "com.example"});
        assert!(error_message(&ok).is_none());
        assert!(error_message(&Value::Null).is_none());
    }

    #[test]
    fn test_element_id_accepts_w3c_and_legacy_keys() {
        let w3c = json!({ ELEMENT_KEY: "abc" });
        let legacy = json!({ "ELEMENT": "def" });
        assert_eq!(element_id(&w3c), Some(ElementId("abc".into())));
        assert_eq!(element_id(&legacy), Some(ElementId("def".into())));
        assert_eq!(element_id(&json!({})), None);
    }

    #[test]
    fn test_app_state_codes() {
        assert_eq!(AppState::from_code(4), Some(AppState::RunningInForeground));
        assert!(AppState::from_code(3).unwrap().is_running());
        assert!(!AppState::from_code(1).unwrap().is_running());
        assert_eq!(AppState::from_code(9), None);
    }
}
