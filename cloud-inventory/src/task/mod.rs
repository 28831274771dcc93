//! Task queue contract.
//!
//! The queue itself (scheduling, backoff, persistence) is an external system.
//! This module defines the narrow surface the core needs from it, the
//! handler trait every task implements, and the outcome tagging the queue
//! uses to decide whether to retry.

mod dispatch;
mod memory;
mod outcome;

pub use dispatch::{Dispatcher, TaskOutcome};
pub use memory::{DrainReport, MemoryQueue, QueuedTask};
pub use outcome::{RetryPolicy, TaskError, provider_status};

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::Result;

/// Queue-assigned task identifier.
pub type TaskId = String;

/// Queue used when nothing else is configured.
pub const DEFAULT_QUEUE: &str = "default";

/// Per-invocation context handed to handlers.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub queue: String,
    pub task_id: TaskId,
    cancel: CancellationToken,
}

impl TaskContext {
    pub fn new(queue: impl Into<String>, task_id: impl Into<TaskId>) -> Self {
        Self {
            queue: queue.into(),
            task_id: task_id.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

/// Submission side of the task queue.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a task. `None` payload is the fan-out sentinel.
    async fn submit(&self, task_type: &str, payload: Option<Vec<u8>>, queue: &str)
    -> Result<TaskId>;
}

/// Serialize `payload` as JSON and submit it.
pub async fn submit_json<T: Serialize + Sync>(
    queue: &dyn TaskQueue,
    task_type: &str,
    payload: &T,
    queue_name: &str,
) -> Result<TaskId> {
    let bytes = serde_json::to_vec(payload)?;
    queue.submit(task_type, Some(bytes), queue_name).await
}

/// A task implementation registered with the dispatcher.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn task_type(&self) -> &str;

    /// Run one invocation.
    ///
    /// Return [`TaskError::Retryable`] to let the queue reschedule and
    /// [`TaskError::Permanent`] to record the failure without retrying.
    async fn handle(
        &self,
        ctx: &TaskContext,
        payload: Option<&[u8]>,
    ) -> std::result::Result<(), TaskError>;
}
