//! Scripted test doubles for the toolchain invoker and the port enumerator.
//!
//! Tests (and downstream consumers writing their own) drive the resolver
//! and orchestrator against these instead of a real toolchain installation
//! or serial bus.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::invoker::{InvokeError, ToolInvoker, ToolOutput};
use crate::ports::{PortEnumerator, SerialEndpoint};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// A [`ToolInvoker`] that answers from a script keyed by subcommand (the
/// first argv element) and records every call it receives.
///
/// Unscripted subcommands answer with a successful empty output, so tests
/// only script what they assert on.
#[derive(Default)]
pub struct ScriptedInvoker {
    responses: Mutex<HashMap<String, ToolOutput>>,
    timeouts: Mutex<HashSet<String>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for a subcommand ("board", "compile", ...).
    pub fn respond(&self, subcommand: &str, output: ToolOutput) {
        lock(&self.responses).insert(subcommand.to_string(), output);
    }

    /// Make a subcommand time out instead of answering.
    pub fn time_out(&self, subcommand: &str) {
        lock(&self.timeouts).insert(subcommand.to_string());
    }

    /// Every argv this invoker received, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        lock(&self.calls).clone()
    }

    /// Number of calls whose subcommand matched.
    pub fn calls_for(&self, subcommand: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|args| args.first().map(String::as_str) == Some(subcommand))
            .count()
    }
}

#[async_trait]
impl ToolInvoker for ScriptedInvoker {
    async fn run(&self, args: &[String], timeout: Duration) -> Result<ToolOutput, InvokeError> {
        lock(&self.calls).push(args.to_vec());

        let key = args.first().cloned().unwrap_or_default();
        if lock(&self.timeouts).contains(&key) {
            return Err(InvokeError::Timeout {
                program: self.program(),
                timeout,
            });
        }
        Ok(lock(&self.responses)
            .get(&key)
            .cloned()
            .unwrap_or_else(|| ToolOutput::ok("")))
    }

    fn program(&self) -> String {
        "scripted-arduino-cli".to_string()
    }
}

/// A [`PortEnumerator`] over a fixed endpoint list, with per-port
/// availability control and a probe log.
#[derive(Default)]
pub struct StaticPorts {
    endpoints: Vec<SerialEndpoint>,
    busy: Mutex<HashSet<String>>,
    probes: Mutex<Vec<String>>,
}

impl StaticPorts {
    pub fn new(endpoints: Vec<SerialEndpoint>) -> Self {
        Self {
            endpoints,
            ..Self::default()
        }
    }

    /// A bus with no endpoints at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Convenience endpoint constructor.
    pub fn endpoint(port_name: &str, device_strings: Option<&str>) -> SerialEndpoint {
        SerialEndpoint {
            port_name: port_name.to_string(),
            device_strings: device_strings.map(str::to_string),
        }
    }

    /// Mark a port as held by another process: probes report unavailable.
    pub fn set_busy(&self, port_name: &str) {
        lock(&self.busy).insert(port_name.to_string());
    }

    /// Release a previously busy port.
    pub fn release(&self, port_name: &str) {
        lock(&self.busy).remove(port_name);
    }

    /// How many times a port was probed.
    pub fn probe_count(&self, port_name: &str) -> usize {
        lock(&self.probes)
            .iter()
            .filter(|p| p.as_str() == port_name)
            .count()
    }
}

impl PortEnumerator for StaticPorts {
    fn list(&self) -> Vec<SerialEndpoint> {
        self.endpoints.clone()
    }

    fn probe(&self, port_name: &str) -> bool {
        lock(&self.probes).push(port_name.to_string());
        !lock(&self.busy).contains(port_name)
    }
}
