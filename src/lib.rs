//! droid-e2e - End-to-end test tooling for Android apps and REST APIs
//!
//! This library provides adb device discovery and boot readiness polling,
//! Appium session fixtures with failure artifacts, and a proxy-aware REST
//! client with an in-process ReqRes mock.

pub mod api;
pub mod artifacts;
pub mod bridge;
pub mod cli;
pub mod commands;
pub mod common;
pub mod session;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Config, Error, Result};
