//! API scenario runner
//!
//! Reads YAML scenarios describing HTTP requests and the responses they
//! must produce, and runs them against the live API or the ReqRes mock.
//! Assertions are made on parsed JSON, not on printed output.

mod config;
mod runner;

pub use config::*;
pub use runner::{check_expectations, load_scenario, run_loaded, run_scenario, TestResult};
