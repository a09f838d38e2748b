//! Common utilities shared by the bridge, session and API layers

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use config::Config;
pub use error::{Error, Result};
