//! REST API testing support
//!
//! An HTTP client that understands corporate proxies, and a ReqRes mock
//! to run the suite against when the live API is off-limits.

mod client;
pub mod mock;

pub use client::{looks_like_proxy_block, ApiClient, ApiResponse, RequestOptions};
pub use mock::MockServer;

use crate::common::config::ApiConfig;
use crate::common::Result;

/// Path probed before running against the live API
pub const HEALTHCHECK_PATH: &str = "/api/users/2";

/// Whether the API can be tested from here
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Ready,
    /// Tests should be reported as skipped, with this reason
    Skip(String),
}

/// Probe the live API once before a suite
///
/// Only meaningful against the live API with `skip_on_proxy` set; in
/// every other case the API is assumed reachable.
pub async fn preflight(client: &ApiClient, config: &ApiConfig) -> Availability {
    if config.use_mock || !config.skip_on_proxy {
        return Availability::Ready;
    }

    match client.get(HEALTHCHECK_PATH).await {
        Ok(resp) if resp.looks_like_proxy_block() => Availability::Skip(format!(
            "ReqRes blocked by proxy ({}). Skipping suite",
            resp.status
        )),
        Ok(_) => Availability::Ready,
        Err(e) => Availability::Skip(format!(
            "ReqRes not reachable from this environment ({}). Skipping suite",
            e
        )),
    }
}

/// Client for the configured API, or for a freshly started mock when
/// `use_mock` is set
///
/// The mock must be kept alive for as long as the client is used.
pub async fn connect(config: &ApiConfig) -> Result<(ApiClient, Option<MockServer>)> {
    let client = ApiClient::new(config)?;
    if config.use_mock {
        let server = MockServer::start().await?;
        let client = client.with_base_url(&server.base_url());
        Ok((client, Some(server)))
    } else {
        Ok((client, None))
    }
}
