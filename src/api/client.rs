//! HTTP client for the REST API under test

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, NoProxy, Proxy};
use serde_json::Value;

use crate::common::config::ApiConfig;
use crate::common::{Error, Result};

/// Longest body shown in logs and failure descriptions
const BODY_PREVIEW_LIMIT: usize = 2048;

/// Per-request options
#[derive(Debug, Default, Clone)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub json: Option<Value>,
    pub headers: Vec<(String, String)>,
    /// Overrides the client's default timeout
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fully read response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub method: Method,
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    pub elapsed: Duration,
}

impl ApiResponse {
    /// Parse the body as JSON
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Header value as text, if present and valid
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether this response came from an intercepting proxy rather than
    /// the API
    pub fn looks_like_proxy_block(&self) -> bool {
        looks_like_proxy_block(self.status, &self.headers)
    }

    /// Status, headers and body as text for logs and failure reports
    pub fn describe(&self) -> String {
        let headers: Vec<String> = self
            .headers
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v.to_str().unwrap_or("<binary>")))
            .collect();
        let body = match self.json() {
            Ok(json) => serde_json::to_string_pretty(&json).unwrap_or_else(|_| self.body.clone()),
            Err(_) => self.body.clone(),
        };
        format!(
            "{} {}\nStatus: {}\n\nHeaders:\n{}\n\nBody:\n{}",
            self.method,
            self.url,
            self.status,
            headers.join("\n"),
            preview(&body)
        )
    }
}

/// Heuristic for responses produced by a corporate proxy
///
/// 401/407, a basic/ntlm/negotiate auth challenge, or a `via`/`server`
/// header naming a proxy.
pub fn looks_like_proxy_block(status: u16, headers: &HeaderMap) -> bool {
    if status == 401 || status == 407 {
        return true;
    }

    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase()
    };

    let auth = format!("{} {}", get("www-authenticate"), get("proxy-authenticate"));
    if ["basic", "ntlm", "negotiate"].iter().any(|t| auth.contains(t)) {
        return true;
    }

    let via = format!("{} {}", get("via"), get("server"));
    ["proxy", "squid"].iter().any(|t| via.contains(t))
}

/// Client bound to one API base URL
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    bearer_token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("droid-e2e/", env!("CARGO_PKG_VERSION")));

        if !config.trust_env {
            builder = builder.no_proxy();
        }

        let no_proxy = config.no_proxy.as_deref().and_then(NoProxy::from_string);
        if let Some(url) = &config.http_proxy {
            let proxy = Proxy::http(url)
                .map_err(|e| Error::Config(format!("Invalid HTTP proxy '{}': {}", url, e)))?;
            builder = builder.proxy(proxy.no_proxy(no_proxy.clone()));
        }
        if let Some(url) = &config.https_proxy {
            let proxy = Proxy::https(url)
                .map_err(|e| Error::Config(format!("Invalid HTTPS proxy '{}': {}", url, e)))?;
            builder = builder.proxy(proxy.no_proxy(no_proxy));
        }

        let timeout = if config.timeout_secs.is_finite() && config.timeout_secs > 0.0 {
            Duration::from_secs_f64(config.timeout_secs)
        } else {
            return Err(Error::Config(format!(
                "API timeout must be positive, got {}",
                config.timeout_secs
            )));
        };

        Ok(Self {
            http: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            bearer_token: config.bearer_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Point the client at another base URL (the mock server, usually)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URLs pass through; paths are joined to the base URL
    pub fn full_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Send a request and read the whole response
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let url = self.full_url(path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .timeout(options.timeout.unwrap_or(self.timeout));

        if !options.query.is_empty() {
            request = request.query(&options.query);
        }

        let mut has_auth = false;
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("Invalid header name '{}': {}", name, e)))?;
            has_auth |= name == AUTHORIZATION;
            request = request.header(name, value.as_str());
        }
        if let (false, Some(token)) = (has_auth, &self.bearer_token) {
            request = request.bearer_auth(token);
        }

        if let Some(body) = &options.json {
            request = request.json(body);
        }

        tracing::debug!(%method, %url, query = ?options.query, "API request");
        let started = Instant::now();
        let response = request.send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.text().await?;
        let elapsed = started.elapsed();

        let response = ApiResponse {
            method,
            url: final_url,
            status,
            headers,
            body,
            elapsed,
        };
        tracing::debug!(
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            body = %preview(&response.body),
            "API response"
        );
        Ok(response)
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::GET, path, RequestOptions::default()).await
    }
}

fn preview(body: &str) -> String {
    if body.len() <= BODY_PREVIEW_LIMIT {
        return body.to_string();
    }
    let mut end = BODY_PREVIEW_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes)", &body[..end], body.len())
}
