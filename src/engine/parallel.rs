use futures::FutureExt;
use futures::future::join_all;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, warn};

use super::result::ExecutionResult;
use crate::events::{Event, EventBus};
use crate::target::BackendTarget;

/// Runs one prompt against many targets at once.
///
/// Every target yields exactly one result, whatever happens to it or to
/// its siblings. Failures are reported in-band, never raised.
#[derive(Default)]
pub struct ParallelEngine {
    events: Option<Arc<EventBus>>,
}

impl ParallelEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit [`Event::BatchStarted`] and one [`Event::TargetCompleted`] per
    /// target on `events`, all tagged with the same batch id.
    pub fn with_events(events: Arc<EventBus>) -> Self {
        Self {
            events: Some(events),
        }
    }

    /// Invoke every target concurrently and wait for all of them.
    ///
    /// `results.len() == targets.len()`. Order is unspecified; key on
    /// [`ExecutionResult::target_name`]. Dropping the returned future
    /// aborts every target still running.
    pub async fn execute(
        &self,
        prompt: &str,
        label: &str,
        targets: &[Arc<dyn BackendTarget>],
    ) -> Vec<ExecutionResult> {
        if targets.is_empty() {
            return Vec::new();
        }

        let batch = self.events.as_ref().map_or(0, |events| events.next_batch_id());
        if let Some(events) = &self.events {
            events.emit(Event::BatchStarted {
                batch,
                label: label.to_string(),
                targets: targets.iter().map(|t| t.name().to_string()).collect(),
            });
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => return batch_failure(label, targets, &e.to_string()),
        };

        let prompt: Arc<str> = Arc::from(prompt);
        let shared_label: Arc<str> = Arc::from(label);

        let orchestration = async {
            let tasks: Vec<JoinHandle<ExecutionResult>> = targets
                .iter()
                .map(|target| {
                    handle.spawn(invoke_one(
                        Arc::clone(target),
                        Arc::clone(&prompt),
                        Arc::clone(&shared_label),
                        batch,
                        self.events.clone(),
                    ))
                })
                .collect();
            let _guard = AbortOnDrop(tasks.iter().map(JoinHandle::abort_handle).collect());

            join_all(tasks)
                .await
                .into_iter()
                .zip(targets)
                .map(|(joined, target)| match joined {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(target_name = %target.name(), error = %e, "target task lost");
                        ExecutionResult::failed(
                            label,
                            target.name(),
                            format!("Parallel execution failed: {e}"),
                            None,
                        )
                    }
                })
                .collect::<Vec<_>>()
        };

        guard_orchestration(label, targets, orchestration).await
    }
}

/// Aborts the spawned target tasks when dropped. Finished tasks are unaffected.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

/// Turn a panic in the orchestration itself into a batch failure.
async fn guard_orchestration<F>(
    label: &str,
    targets: &[Arc<dyn BackendTarget>],
    orchestration: F,
) -> Vec<ExecutionResult>
where
    F: Future<Output = Vec<ExecutionResult>>,
{
    match AssertUnwindSafe(orchestration).catch_unwind().await {
        Ok(results) => results,
        Err(panic) => batch_failure(label, targets, &panic_message(panic.as_ref())),
    }
}

async fn invoke_one(
    target: Arc<dyn BackendTarget>,
    prompt: Arc<str>,
    label: Arc<str>,
    batch: u64,
    events: Option<Arc<EventBus>>,
) -> ExecutionResult {
    let name = target.name().to_string();

    let start = Instant::now();
    let outcome = AssertUnwindSafe(target.invoke(&prompt)).catch_unwind().await;
    let elapsed = start.elapsed();

    let result = match outcome {
        Ok(Ok(text)) if target.simulated() => {
            ExecutionResult::mock(&label, &name, text, Some(elapsed))
        }
        Ok(Ok(text)) => ExecutionResult::succeeded(&label, &name, text, Some(elapsed)),
        Ok(Err(e)) => {
            warn!(target_name = %name, error = %e, "target failed");
            ExecutionResult::failed(&label, &name, e.to_string(), Some(elapsed))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(target_name = %name, panic = %message, "target panicked");
            ExecutionResult::failed(
                &label,
                &name,
                format!("target panicked: {message}"),
                Some(elapsed),
            )
        }
    };

    debug!(
        target_name = %name,
        status = %result.status(),
        elapsed_ms = elapsed.as_millis() as u64,
        "target completed"
    );

    if let Some(events) = &events {
        events.emit(Event::TargetCompleted {
            batch,
            label: label.to_string(),
            target: name,
            status: result.status(),
            elapsed,
        });
    }

    result
}

/// One error per target when the orchestration itself broke down.
fn batch_failure(
    label: &str,
    targets: &[Arc<dyn BackendTarget>],
    reason: &str,
) -> Vec<ExecutionResult> {
    error!(label, reason, targets = targets.len(), "parallel execution failed");
    targets
        .iter()
        .map(|target| {
            ExecutionResult::failed(
                label,
                target.name(),
                format!("Parallel execution failed: {reason}"),
                None,
            )
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
