pub mod aggregate;
pub mod dispatch;
pub mod parallel;
pub mod result;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use self::aggregate::select_first_success;
use self::dispatch::Dispatcher;
use self::parallel::ParallelEngine;
use self::result::ExecutionResult;
use crate::consts::DEFAULT_MOCK_TEMPLATE;
use crate::events::EventBus;
use crate::target::TargetRegistry;

/// The outermost boundary. Front ends only know this trait.
///
/// None of these calls fail: every target problem comes back in-band as an
/// error [`ExecutionResult`].
#[async_trait]
pub trait Engine: Send + Sync {
    /// Fan `prompt` out to every named target. One result per requested
    /// name, duplicates and unknown names included.
    async fn execute_parallel(
        &self,
        prompt: &str,
        target_names: &[String],
        label: &str,
    ) -> Vec<ExecutionResult>;

    async fn execute_single(&self, prompt: &str, target_name: &str, label: &str) -> ExecutionResult {
        let names = [target_name.to_string()];
        self.execute_parallel(prompt, &names, label)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                ExecutionResult::failed(label, target_name, "No results returned", None)
            })
    }

    /// Run everything, then return the first success in `target_names` order.
    /// The result is an error only if every target failed.
    async fn execute_with_fallback(
        &self,
        prompt: &str,
        target_names: &[String],
        label: &str,
    ) -> ExecutionResult {
        let results = self.execute_parallel(prompt, target_names, label).await;
        select_first_success(&results, target_names)
    }
}

/// Construction-time switches for [`PromptExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Replace every target with a deterministic stub.
    pub mock_mode: bool,
    /// Template the stubs render. `{prompt}` and `{target}` are substituted.
    pub mock_template: String,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            mock_mode: false,
            mock_template: DEFAULT_MOCK_TEMPLATE.to_string(),
        }
    }
}

/// Dispatcher + parallel engine over a fixed registry.
///
/// Build one per process and share it by `Arc`; it holds no per-request state.
pub struct PromptExecutor {
    registry: Arc<TargetRegistry>,
    engine: ParallelEngine,
    mock_mode: bool,
}

impl PromptExecutor {
    /// Mock mode is decided here, once, for the executor's whole lifetime.
    pub fn new(registry: TargetRegistry, options: ExecutorOptions) -> Self {
        let registry = if options.mock_mode {
            info!(targets = registry.len(), "mock mode: all targets replaced by stubs");
            registry.mocked(&options.mock_template)
        } else {
            registry
        };
        Self {
            registry: Arc::new(registry),
            engine: ParallelEngine::new(),
            mock_mode: options.mock_mode,
        }
    }

    /// Publish progress on `events` while batches run.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.engine = ParallelEngine::with_events(events);
        self
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn mock_mode(&self) -> bool {
        self.mock_mode
    }
}

#[async_trait]
impl Engine for PromptExecutor {
    async fn execute_parallel(
        &self,
        prompt: &str,
        target_names: &[String],
        label: &str,
    ) -> Vec<ExecutionResult> {
        let dispatch = Dispatcher::new(&self.registry).dispatch(target_names, label);
        debug!(
            label,
            requested = target_names.len(),
            runnable = dispatch.runnable.len(),
            rejected = dispatch.rejected.len(),
            "dispatching batch"
        );

        let mut results = dispatch.rejected;
        if !dispatch.runnable.is_empty() {
            results.extend(self.engine.execute(prompt, label, &dispatch.runnable).await);
        }
        results
    }
}
