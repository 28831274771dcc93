//! Periodic submission of the parameterless tasks.
//!
//! The scheduler only enqueues; the queue's consumers run the work. Each
//! scheduled task ticks on its own interval, starting immediately.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::collector::COLLECT_ALL;
use crate::config::InventoryConfig;
use crate::housekeeper::HOUSEKEEPER;
use crate::linker::LINK_ALL;
use crate::task::{TaskId, TaskQueue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub task_type: String,
    pub interval: Duration,
}

pub struct Scheduler {
    queue: Arc<dyn TaskQueue>,
    queue_name: String,
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    pub fn new(queue: Arc<dyn TaskQueue>, queue_name: impl Into<String>) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            tasks: Vec::new(),
        }
    }

    /// Collect-all, link-all and housekeeper on their configured intervals.
    pub fn from_config(queue: Arc<dyn TaskQueue>, config: &InventoryConfig) -> Self {
        Self::new(queue, config.queue.clone())
            .every(COLLECT_ALL, config.collect_interval)
            .every(LINK_ALL, config.link_interval)
            .every(HOUSEKEEPER, config.housekeeping_interval)
    }

    pub fn every(mut self, task_type: impl Into<String>, interval: Duration) -> Self {
        self.tasks.push(ScheduledTask {
            task_type: task_type.into(),
            interval,
        });
        self
    }

    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    /// Submit `task_type` once with no payload.
    pub async fn submit(&self, task_type: &str) -> Result<TaskId> {
        self.queue.submit(task_type, None, &self.queue_name).await
    }

    /// Spawn one submission loop per scheduled task.
    ///
    /// The loops exit when `cancel` fires.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        info!(tasks = self.tasks.len(), queue = %self.queue_name, "Starting scheduler");
        (0..self.tasks.len())
            .map(|index| {
                let scheduler = self.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { scheduler.run_loop(index, cancel).await })
            })
            .collect()
    }

    async fn run_loop(&self, index: usize, cancel: CancellationToken) {
        let Some(task) = self.tasks.get(index) else {
            return;
        };
        let mut ticker = tokio::time::interval(task.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(task_type = %task.task_type, "Scheduler loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.submit(&task.task_type).await {
                        Ok(task_id) => debug!(
                            task_type = %task.task_type,
                            task_id = %task_id,
                            "Scheduled task submitted"
                        ),
                        Err(e) => warn!(
                            task_type = %task.task_type,
                            error = %e,
                            "Failed to submit scheduled task"
                        ),
                    }
                }
            }
        }
    }
}
