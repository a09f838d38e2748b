//! In-process ReqRes mock
//!
//! Serves canned answers for the endpoints the API suite exercises, so
//! the suite runs offline and behind proxies. Binds to an ephemeral
//! loopback port unless told otherwise.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::common::{Error, Result};

/// Longest delay honoured by `?delay=N`
const MAX_DELAY_SECS: u64 = 5;

const TIMESTAMP: &str = "2025-01-01T00:00:00Z";

/// ReqRes routes
pub fn router() -> Router {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/:id",
            get(single_user)
                .put(update_user)
                .patch(update_user)
                .delete(delete_user),
        )
        .route("/api/register", post(register))
}

async fn list_users(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    if query.get("page").map(String::as_str) == Some("2") {
        return Json(json!({
            "page": 2,
            "per_page": 6,
            "total": 12,
            "total_pages": 2,
            "data": [{
                "id": 7,
                "email": "michael.lawson@reqres.in",
                "first_name": "Michael",
                "last_name": "Lawson",
            }],
        }));
    }

    if let Some(delay) = query.get("delay") {
        let secs = delay.trim().parse::<u64>().unwrap_or(0).min(MAX_DELAY_SECS);
        if secs > 0 {
            tokio::time::sleep(Duration::from_secs(secs)).await;
        }
    }

    Json(json!({ "data": [] }))
}

async fn single_user(Path(id): Path<u32>) -> Response {
    match id {
        2 => Json(json!({
            "data": {
                "id": 2,
                "email": "janet.weaver@reqres.in",
                "first_name": "Janet",
                "last_name": "Weaver",
            }
        }))
        .into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({}))).into_response(),
    }
}

async fn create_user(body: Bytes) -> (StatusCode, Json<Value>) {
    let input = parse_body(&body);
    let mut created = json!({
        "id": "123",
        "name": "morpheus",
        "job": "leader",
        "createdAt": TIMESTAMP,
    });
    for key in ["name", "job"] {
        if let Some(value) = input.get(key) {
            created[key] = value.clone();
        }
    }
    (StatusCode::CREATED, Json(created))
}

async fn update_user(Path(id): Path<u32>, body: Bytes) -> Response {
    if id != 2 {
        return (StatusCode::NOT_FOUND, Json(json!({}))).into_response();
    }
    let mut updated = parse_body(&body);
    if !updated.is_object() {
        updated = json!({});
    }
    updated["updatedAt"] = json!(TIMESTAMP);
    Json(updated).into_response()
}

async fn delete_user(Path(_id): Path<u32>) -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn register(body: Bytes) -> (StatusCode, Json<Value>) {
    let input = parse_body(&body);
    let present = |key: &str| {
        input
            .get(key)
            .and_then(Value::as_str)
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    };

    if present("email") && present("password") {
        (StatusCode::OK, Json(json!({ "id": 4, "token": "QpwL5tke4Pnpja7X4" })))
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": "Missing password" })))
    }
}

/// Malformed or empty bodies read as an empty object
fn parse_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|_| json!({}))
}

/// A running mock server; stops when dropped
pub struct MockServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Start on an ephemeral loopback port
    pub async fn start() -> Result<Self> {
        Self::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router())
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Mock server stopped");
            }
        });

        tracing::info!(%addr, "ReqRes mock listening");
        Ok(Self {
            addr,
            shutdown: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for the server task
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Serve the mock in the foreground until the process is interrupted
pub async fn serve(addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    println!("ReqRes mock listening on http://{}", local);
    axum::serve(listener, router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| Error::Internal(format!("Mock server failed: {}", e)))
}
