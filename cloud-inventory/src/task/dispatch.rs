//! Routes dequeued tasks to their handlers.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use super::{TaskContext, TaskError, TaskHandler};
use crate::registry::{Registry, RegistryError};

/// What the queue should do with a finished invocation.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TaskOutcome {
    Completed,
    /// Reschedule with backoff.
    Retry(String),
    /// Record the failure; never retry.
    Skip(String),
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Task type to handler table, assembled once at bootstrap.
pub struct Dispatcher {
    handlers: Registry<String, Arc<dyn TaskHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Registry::new("task handlers"),
        }
    }

    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) -> Result<(), RegistryError> {
        self.handlers
            .register(handler.task_type().to_string(), handler)
    }

    pub fn must_register(&mut self, handler: Arc<dyn TaskHandler>) {
        self.handlers
            .must_register(handler.task_type().to_string(), handler);
    }

    pub fn handler(&self, task_type: &str) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(&task_type.to_string())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered task types, sorted.
    pub fn task_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Run the handler for `task_type` and tag the result for the queue.
    ///
    /// An unknown task type is a deployment mismatch and is skipped.
    pub async fn dispatch(
        &self,
        ctx: &TaskContext,
        task_type: &str,
        payload: Option<&[u8]>,
    ) -> TaskOutcome {
        let Some(handler) = self.handler(task_type) else {
            error!(task_type, task_id = %ctx.task_id, "No handler registered");
            return TaskOutcome::Skip(format!("no handler registered for task type '{task_type}'"));
        };

        let start = Instant::now();
        let result = handler.handle(ctx, payload).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                info!(task_type, task_id = %ctx.task_id, duration_ms, "Task completed");
                TaskOutcome::Completed
            }
            Err(TaskError::Permanent(e)) => {
                error!(
                    task_type,
                    task_id = %ctx.task_id,
                    error = %e,
                    "Task failed permanently; not retrying"
                );
                TaskOutcome::Skip(e.to_string())
            }
            Err(TaskError::Retryable(e)) => {
                warn!(
                    task_type,
                    task_id = %ctx.task_id,
                    error = %e,
                    "Task failed; eligible for retry"
                );
                TaskOutcome::Retry(e.to_string())
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("task_types", &self.task_types())
            .finish()
    }
}
