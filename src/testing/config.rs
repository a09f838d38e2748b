//! API scenario configuration types
//!
//! Defines the data structures for deserializing YAML API scenarios.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A complete API scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct ApiScenario {
    /// Name of the scenario
    pub name: String,
    /// Optional description of what the scenario verifies
    pub description: Option<String>,
    /// Force the mock (`true`) or the live API (`false`) for this scenario
    pub mock: Option<bool>,
    /// The requests to send, in order
    pub steps: Vec<ApiStep>,
}

/// One request and what its response must look like
#[derive(Deserialize, Debug)]
pub struct ApiStep {
    /// Label shown in the output; defaults to `METHOD path`
    pub name: Option<String>,
    /// HTTP method (default: GET)
    #[serde(default = "default_method")]
    pub method: String,
    /// Path relative to the base URL, or an absolute URL
    pub path: String,
    /// Query parameters; scalar values are sent as text
    #[serde(default)]
    pub query: BTreeMap<String, Value>,
    /// JSON request body
    pub json: Option<Value>,
    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Per-request timeout in seconds
    pub timeout_secs: Option<f64>,
    /// Expected response
    #[serde(default)]
    pub expect: ResponseExpectation,
}

fn default_method() -> String {
    "GET".to_string()
}

impl ApiStep {
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.method.to_uppercase(), self.path))
    }

    /// Query parameters rendered as strings
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .iter()
            .map(|(k, v)| {
                let text = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), text)
            })
            .collect()
    }
}

/// Expectations for a response
#[derive(Deserialize, Debug, Default)]
pub struct ResponseExpectation {
    /// Expected status code
    pub status: Option<u16>,
    /// Substring that must appear in the raw body
    pub body_contains: Option<String>,
    /// Assertions on fields of the JSON body
    #[serde(default)]
    pub json: Vec<JsonAssertion>,
    /// Lower bound on the response time, in milliseconds
    pub min_elapsed_ms: Option<u64>,
}

/// Assertion on one field of a JSON body
#[derive(Deserialize, Debug)]
pub struct JsonAssertion {
    /// JSON pointer to the field (e.g. `/data/id`)
    pub pointer: String,
    /// Expected value (exact match)
    pub equals: Option<Value>,
    /// Whether the field must exist (`true`) or be absent (`false`)
    pub exists: Option<bool>,
    /// Field must be a non-empty string, array or object
    pub non_empty: Option<bool>,
}
