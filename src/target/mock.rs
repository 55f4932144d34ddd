use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{BackendTarget, InvocationError};
use crate::consts::DEFAULT_MOCK_TEMPLATE;

/// A deterministic stand-in for a real backend. Renders a fixed template
/// instead of calling anything. Used by mock mode and by tests.
pub struct MockTarget {
    name: String,
    template: String,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockTarget {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            template: DEFAULT_MOCK_TEMPLATE.to_string(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Template with `{prompt}` and `{target}` placeholders.
    pub fn with_template(mut self, template: &str) -> Self {
        self.template = template.to_string();
        self
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times [`BackendTarget::invoke`] has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn render(&self, prompt: &str) -> String {
        self.template
            .replace("{target}", &self.name)
            .replace("{prompt}", prompt)
    }
}

#[async_trait]
impl BackendTarget for MockTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "mock"
    }

    fn simulated(&self) -> bool {
        true
    }

    async fn invoke(&self, prompt: &str) -> Result<String, InvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.render(prompt))
    }
}
