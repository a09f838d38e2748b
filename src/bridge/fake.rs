//! Scripted bridge for unit tests

use std::sync::Mutex;

use async_trait::async_trait;

use super::runner::{build_args, Bridge, CommandOutput};
use crate::common::Result;

type Handler = dyn Fn(&[String]) -> Result<CommandOutput> + Send + Sync;

/// Answers each call with a closure and records the argument vectors
pub struct ScriptedBridge {
    handler: Box<Handler>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedBridge {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&[String]) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// All calls so far, `-s <serial>` included
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose arguments contain `needle` as one element
    pub fn count_containing(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|argv| argv.iter().any(|a| a == needle))
            .count()
    }
}

#[async_trait]
impl Bridge for ScriptedBridge {
    async fn run(&self, serial: Option<&str>, args: &[&str]) -> Result<CommandOutput> {
        let argv = build_args(serial, args);
        self.calls.lock().unwrap().push(argv.clone());
        (self.handler)(&argv)
    }
}
