pub mod http;
pub mod mock;
pub mod process;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use self::mock::MockTarget;

/// Why a single target failed to produce text.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("missing credential: {0} is not set")]
    MissingCredential(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that turns a prompt into text. A subprocess, an HTTP API, or a stub.
///
/// Implementations own whatever session or connection state they need;
/// the engine only ever calls [`BackendTarget::invoke`] once per request.
#[async_trait]
pub trait BackendTarget: Send + Sync {
    fn name(&self) -> &str;

    /// Short label for listings, e.g. `"http"`.
    fn kind(&self) -> &str;

    /// Simulate-only targets perform no external side effect.
    /// Their successes are reported with the `mock` status.
    fn simulated(&self) -> bool {
        false
    }

    async fn invoke(&self, prompt: &str) -> Result<String, InvocationError>;
}

/// Known targets by name. Built once, then shared read-only behind an `Arc`.
#[derive(Default, Clone)]
pub struct TargetRegistry {
    targets: HashMap<String, Arc<dyn BackendTarget>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target under its own name, replacing any previous one.
    pub fn register(&mut self, target: Arc<dyn BackendTarget>) {
        let name = target.name().to_string();
        self.targets.insert(name, target);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BackendTarget>> {
        self.targets.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.targets.keys().cloned().collect();
        names.sort();
        names
    }

    /// `(name, kind)` pairs, sorted by name.
    pub fn describe(&self) -> Vec<(String, String)> {
        self.names()
            .into_iter()
            .filter_map(|name| {
                let kind = self.targets.get(&name)?.kind().to_string();
                Some((name, kind))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// A registry with the same names where every target is a [`MockTarget`]
    /// rendering `template`.
    pub fn mocked(&self, template: &str) -> Self {
        let mut mocked = Self::new();
        for name in self.targets.keys() {
            mocked.register(Arc::new(MockTarget::new(name).with_template(template)));
        }
        mocked
    }
}

/// Cut `output` to at most `max_bytes` on a char boundary, noting what was dropped.
pub(crate) fn truncate_output(output: &str, max_bytes: usize) -> String {
    if output.len() <= max_bytes {
        return output.to_string();
    }
    let mut end = max_bytes;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n[truncated: showing {}/{} bytes]",
        &output[..end],
        end,
        output.len()
    )
}
