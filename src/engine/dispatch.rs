use std::sync::Arc;
use tracing::debug;

use super::result::ExecutionResult;
use crate::target::{BackendTarget, TargetRegistry};

/// Requested names split into what can run and what was rejected up front.
pub struct Dispatch {
    /// Results for names the registry doesn't know. Never invoked.
    pub rejected: Vec<ExecutionResult>,
    /// Targets to invoke, in request order. Duplicates are kept.
    pub runnable: Vec<Arc<dyn BackendTarget>>,
}

/// Resolves target names against a registry without doing any I/O.
pub struct Dispatcher<'a> {
    registry: &'a TargetRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a TargetRegistry) -> Self {
        Self { registry }
    }

    pub fn dispatch(&self, target_names: &[String], label: &str) -> Dispatch {
        let mut rejected = Vec::new();
        let mut runnable = Vec::with_capacity(target_names.len());

        for name in target_names {
            match self.registry.get(name) {
                Some(target) => {
                    debug!(target_name = %name, label, "target accepted");
                    runnable.push(target);
                }
                None => {
                    debug!(target_name = %name, label, "unknown target rejected");
                    rejected.push(unknown_target(label, name));
                }
            }
        }

        Dispatch { rejected, runnable }
    }
}

pub fn unknown_target(label: &str, name: &str) -> ExecutionResult {
    ExecutionResult::failed(label, name, format!("Unknown server: {name}"), None)
}
