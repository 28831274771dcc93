//! In-process task queue.
//!
//! Backs the binary and the tests. Each queued task is dispatched exactly
//! once; retryable failures are reported, not rescheduled, since retry
//! policy belongs to the real queue.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Dispatcher, TaskContext, TaskId, TaskOutcome, TaskQueue};
use crate::Result;

/// A submitted, not yet dispatched task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTask {
    pub id: TaskId,
    pub task_type: String,
    pub payload: Option<Vec<u8>>,
    pub queue: String,
}

impl QueuedTask {
    /// Decode the payload as JSON.
    pub fn payload_json<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.payload
            .as_deref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }
}

/// Result of one [`MemoryQueue::drain`].
#[derive(Debug, Default)]
pub struct DrainReport {
    pub outcomes: Vec<(QueuedTask, TaskOutcome)>,
}

impl DrainReport {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Completed))
    }

    pub fn retried(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Retry(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Skip(_)))
    }

    fn count(&self, pred: impl Fn(&TaskOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// FIFO queue kept in memory.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    pending: Mutex<VecDeque<QueuedTask>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Remove and return everything queued, without dispatching.
    pub fn take_pending(&self) -> Vec<QueuedTask> {
        self.pending.lock().drain(..).collect()
    }

    /// Dispatch queued tasks until the queue is empty or `cancel` fires.
    ///
    /// Tasks submitted while draining (fan-out children) are picked up in
    /// the same call.
    pub async fn drain(&self, dispatcher: &Dispatcher, cancel: &CancellationToken) -> DrainReport {
        let mut report = DrainReport::default();
        loop {
            if cancel.is_cancelled() {
                debug!("Drain cancelled");
                break;
            }
            let Some(task) = self.pending.lock().pop_front() else {
                break;
            };

            let ctx = TaskContext::new(task.queue.clone(), task.id.clone())
                .with_cancellation(cancel.child_token());
            let outcome = dispatcher
                .dispatch(&ctx, &task.task_type, task.payload.as_deref())
                .await;
            report.outcomes.push((task, outcome));
        }

        if !report.outcomes.is_empty() {
            info!(
                completed = report.completed(),
                retried = report.retried(),
                skipped = report.skipped(),
                "Queue drained"
            );
        }
        report
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn submit(
        &self,
        task_type: &str,
        payload: Option<Vec<u8>>,
        queue: &str,
    ) -> Result<TaskId> {
        let id = Uuid::new_v4().to_string();
        debug!(task_type, task_id = %id, queue, "Enqueued task");
        self.pending.lock().push_back(QueuedTask {
            id: id.clone(),
            task_type: task_type.to_string(),
            payload,
            queue: queue.to_string(),
        });
        Ok(id)
    }
}
