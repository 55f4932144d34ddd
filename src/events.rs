//! Progress events for in-flight batches.
//!
//! The executor emits via [`EventBus::emit`]; front ends subscribe via
//! [`EventBus::subscribe`]. Built on [`tokio::sync::broadcast`] so emitting
//! never blocks and costs nothing without listeners.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::engine::result::ExecutionStatus;

/// Events that flow out of the executor.
#[derive(Debug, Clone)]
pub enum Event {
    /// A batch was dispatched to these (known) targets.
    BatchStarted {
        batch: u64,
        label: String,
        targets: Vec<String>,
    },
    /// One target finished, successfully or not.
    TargetCompleted {
        batch: u64,
        label: String,
        target: String,
        status: ExecutionStatus,
        elapsed: Duration,
    },
}

/// A broadcast channel that any component can emit to or subscribe from.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    next_batch: AtomicU64,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            next_batch: AtomicU64::new(1),
        }
    }

    /// Emit an event to all current subscribers.
    /// Returns the number of receivers that will see it.
    pub fn emit(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// A fresh id for tagging one batch's events. Never 0.
    pub fn next_batch_id(&self) -> u64 {
        self.next_batch.fetch_add(1, Ordering::Relaxed)
    }

    /// Subscribe to events. Does not replay past ones.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
