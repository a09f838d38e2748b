//! API scenario runner
//!
//! Executes scenarios against the configured API (or the mock) and
//! asserts on the parsed response rather than on printed output.

use std::path::Path;
use std::time::Duration;

use colored::Colorize;
use reqwest::Method;
use serde_json::Value;

use crate::api::{self, ApiClient, ApiResponse, Availability, RequestOptions};
use crate::artifacts::ArtifactSink;
use crate::common::config::ApiConfig;
use crate::common::{Error, Result};

use super::config::{ApiScenario, ApiStep, JsonAssertion, ResponseExpectation};

/// Result of a scenario run
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    /// Reason the scenario was skipped, if it was
    pub skipped: Option<String>,
    pub steps_run: usize,
    pub steps_total: usize,
    pub error: Option<String>,
}

impl TestResult {
    fn skipped(name: &str, steps_run: usize, steps_total: usize, reason: String) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            skipped: Some(reason),
            steps_run,
            steps_total,
            error: None,
        }
    }

    fn failed(name: &str, steps_run: usize, steps_total: usize, error: String) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            skipped: None,
            steps_run,
            steps_total,
            error: Some(error),
        }
    }
}

/// Load a scenario from a YAML file
pub fn load_scenario(path: &Path) -> Result<ApiScenario> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read test scenario '{}': {}",
            path.display(),
            e
        ))
    })?;

    serde_yaml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse test scenario: {}", e)))
}

/// Run a scenario from a YAML file
pub async fn run_scenario(
    path: &Path,
    config: &ApiConfig,
    sink: Option<&ArtifactSink>,
    verbose: bool,
) -> Result<TestResult> {
    let scenario = load_scenario(path)?;
    run_loaded(&scenario, config, sink, verbose).await
}

/// Run an already parsed scenario
pub async fn run_loaded(
    scenario: &ApiScenario,
    config: &ApiConfig,
    sink: Option<&ArtifactSink>,
    verbose: bool,
) -> Result<TestResult> {
    let steps_total = scenario.steps.len();

    let mut config = config.clone();
    if let Some(mock) = scenario.mock {
        config.use_mock = mock;
    }

    println!(
        "\n{} {}",
        "Running Test:".blue().bold(),
        scenario.name.white().bold()
    );
    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }

    // The mock lives until the end of this function
    let (client, _mock) = api::connect(&config).await?;
    if verbose {
        let target = if config.use_mock { "mock" } else { "live" };
        println!("  Target: {} ({})", client.base_url().dimmed(), target);
    }

    if let Availability::Skip(reason) = api::preflight(&client, &config).await {
        println!("  {} {}", "-".yellow(), reason.yellow());
        return Ok(TestResult::skipped(&scenario.name, 0, steps_total, reason));
    }

    println!("\n{}", "Steps:".cyan());

    for (i, step) in scenario.steps.iter().enumerate() {
        let step_num = i + 1;
        let label = step.label();

        let response = match send_step(&client, step).await {
            Ok(response) => response,
            Err(e) => {
                println!("  {} Step {}: {}", "✗".red(), step_num, e);
                return Ok(TestResult::failed(&scenario.name, step_num, steps_total, e.to_string()));
            }
        };

        if config.skip_on_proxy && response.looks_like_proxy_block() {
            let reason = format!("ReqRes blocked by proxy ({}). {}", response.status, label);
            println!("  {} Step {}: {}", "-".yellow(), step_num, reason.yellow());
            return Ok(TestResult::skipped(&scenario.name, step_num, steps_total, reason));
        }

        if let Err(e) = check_expectations(&step.expect, &response) {
            println!("  {} Step {}: {}", "✗".red(), step_num, e);
            if verbose {
                println!("{}", response.describe().dimmed());
            }
            if let Some(sink) = sink {
                let name = format!("{}-step{}", scenario.name, step_num);
                sink.write(&name, "response", "txt", response.describe().as_bytes());
            }
            return Ok(TestResult::failed(&scenario.name, step_num, steps_total, e.to_string()));
        }

        println!(
            "  {} Step {}: {} ({} in {} ms)",
            "✓".green(),
            step_num,
            label.dimmed(),
            response.status,
            response.elapsed.as_millis()
        );
    }

    println!(
        "\n{} {}\n",
        "✓".green().bold(),
        "Test Passed".green().bold()
    );

    Ok(TestResult {
        name: scenario.name.clone(),
        passed: true,
        skipped: None,
        steps_run: steps_total,
        steps_total,
        error: None,
    })
}

/// Send the request described by a step
async fn send_step(client: &ApiClient, step: &ApiStep) -> Result<ApiResponse> {
    let method = Method::from_bytes(step.method.to_uppercase().as_bytes())
        .map_err(|_| Error::Config(format!("Invalid HTTP method '{}'", step.method)))?;

    let mut options = RequestOptions {
        query: step.query_pairs(),
        json: step.json.clone(),
        ..RequestOptions::default()
    };
    for (name, value) in &step.headers {
        options = options.header(name, value);
    }
    if let Some(secs) = step.timeout_secs.filter(|s| s.is_finite() && *s > 0.0) {
        options = options.timeout(Duration::from_secs_f64(secs));
    }

    client.request(method, &step.path, options).await
}

/// Check a response against its expectations
pub fn check_expectations(expect: &ResponseExpectation, response: &ApiResponse) -> Result<()> {
    if let Some(status) = expect.status {
        if response.status != status {
            return Err(Error::TestAssertion(format!(
                "Expected status {}, got {}",
                status, response.status
            )));
        }
    }

    if let Some(needle) = &expect.body_contains {
        if !response.body.contains(needle.as_str()) {
            return Err(Error::TestAssertion(format!(
                "Expected body containing '{}'",
                needle
            )));
        }
    }

    if let Some(min) = expect.min_elapsed_ms {
        let elapsed = response.elapsed.as_millis() as u64;
        if elapsed < min {
            return Err(Error::TestAssertion(format!(
                "Expected response to take at least {} ms, took {} ms",
                min, elapsed
            )));
        }
    }

    if !expect.json.is_empty() {
        let body = response.json().map_err(|e| {
            Error::TestAssertion(format!("Response body is not JSON: {}", e))
        })?;
        for assertion in &expect.json {
            check_json(&body, assertion)?;
        }
    }

    Ok(())
}

fn check_json(body: &Value, assertion: &JsonAssertion) -> Result<()> {
    let pointer = assertion.pointer.as_str();
    let field = body.pointer(pointer);

    if let Some(should_exist) = assertion.exists {
        if field.is_some() != should_exist {
            return Err(Error::TestAssertion(format!(
                "Field '{}': expected exists={}, got exists={}",
                pointer,
                should_exist,
                field.is_some()
            )));
        }
    }

    if let Some(expected) = &assertion.equals {
        match field {
            Some(actual) if actual == expected => {}
            Some(actual) => {
                return Err(Error::TestAssertion(format!(
                    "Field '{}': expected {}, got {}",
                    pointer, expected, actual
                )))
            }
            None => {
                return Err(Error::TestAssertion(format!(
                    "Field '{}' not found, expected {}",
                    pointer, expected
                )))
            }
        }
    }

    if assertion.non_empty == Some(true) {
        let non_empty = match field {
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        };
        if !non_empty {
            return Err(Error::TestAssertion(format!(
                "Field '{}': expected a non-empty value",
                pointer
            )));
        }
    }

    Ok(())
}
