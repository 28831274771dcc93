//! Retention sweeps.
//!
//! The housekeeper is the only component that deletes resource rows. Link
//! rows go with them through `ON DELETE CASCADE`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::database::repositories::HousekeepingRepository;
use crate::database::schema::ModelDescriptor;
use crate::database::time::{now_ms, retention_cutoff_ms};
use crate::metrics::{DynamicMetrics, MetricDescriptor};
use crate::registry::Registry;
use crate::task::{TaskContext, TaskError, TaskHandler};
use crate::{Error, Result};

/// Task type of the housekeeper.
pub const HOUSEKEEPER: &str = "housekeeper";

/// One model to sweep and how long its rows may go unrefreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionEntry {
    pub model: String,
    pub retention_secs: u64,
}

impl RetentionEntry {
    pub fn new(model: impl Into<String>, retention: Duration) -> Self {
        Self {
            model: model.into(),
            retention_secs: retention.as_secs(),
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HousekeeperPayload {
    #[serde(default)]
    pub entries: Vec<RetentionEntry>,
}

/// Model name to table registry, shared with bootstrap.
pub type ModelRegistry = Registry<String, ModelDescriptor>;

pub struct Housekeeper {
    models: Arc<ModelRegistry>,
    repo: Arc<dyn HousekeepingRepository>,
    metrics: Arc<DynamicMetrics>,
    default_retention: Duration,
}

impl Housekeeper {
    pub fn new(
        models: Arc<ModelRegistry>,
        repo: Arc<dyn HousekeepingRepository>,
        metrics: Arc<DynamicMetrics>,
        default_retention: Duration,
    ) -> Self {
        Self {
            models,
            repo,
            metrics,
            default_retention,
        }
    }

    pub fn metric_descriptor() -> MetricDescriptor {
        MetricDescriptor::new(HOUSEKEEPER, "Rows deleted by the latest retention sweep", &["model"])
    }

    /// Every registered model at the default retention, sorted by name.
    pub fn default_payload(&self) -> HousekeeperPayload {
        let mut models: Vec<&String> = self.models.keys().collect();
        models.sort();
        HousekeeperPayload {
            entries: models
                .into_iter()
                .map(|m| RetentionEntry::new(m.clone(), self.default_retention))
                .collect(),
        }
    }

    pub async fn run(&self, payload: &HousekeeperPayload) -> Result<u64> {
        self.run_at(payload, Utc::now()).await
    }

    /// Sweep each entry against `now`.
    ///
    /// Rows updated strictly before `now - retention` are deleted. Entries
    /// that fail are logged and skipped; their errors come back joined after
    /// the remaining entries ran. Returns the total deleted on success.
    pub async fn run_at(&self, payload: &HousekeeperPayload, now: DateTime<Utc>) -> Result<u64> {
        let mut total = 0u64;
        let mut errors = Vec::new();

        for entry in &payload.entries {
            match self.sweep(entry, now).await {
                Ok(deleted) => total += deleted,
                Err(e) => {
                    error!(model = %entry.model, error = %e, "Retention sweep failed");
                    errors.push(e);
                }
            }
        }

        info!(
            entries = payload.entries.len(),
            deleted = total,
            failed = errors.len(),
            "Housekeeping finished"
        );
        Error::join(errors)?;
        Ok(total)
    }

    async fn sweep(&self, entry: &RetentionEntry, now: DateTime<Utc>) -> Result<u64> {
        let model = self
            .models
            .get(&entry.model)
            .ok_or_else(|| Error::not_found("model", entry.model.clone()))?;

        let cutoff = retention_cutoff_ms(now, entry.retention());
        let started_at = now_ms();
        let deleted = self.repo.delete_stale(model, cutoff).await?;
        let completed_at = now_ms();

        self.repo
            .record_run(model.name, started_at, completed_at, deleted)
            .await?;
        if let Err(e) = self.metrics.record(HOUSEKEEPER, &[model.name], deleted as f64) {
            warn!(model = model.name, error = %e, "Failed to record housekeeper metric");
        }

        info!(model = model.name, cutoff, deleted, "Deleted stale rows");
        Ok(deleted)
    }
}

#[async_trait]
impl TaskHandler for Housekeeper {
    fn task_type(&self) -> &str {
        HOUSEKEEPER
    }

    /// A missing or zero-length payload sweeps every registered model.
    async fn handle(
        &self,
        _ctx: &TaskContext,
        payload: Option<&[u8]>,
    ) -> std::result::Result<(), TaskError> {
        let payload = match payload.filter(|bytes| !bytes.is_empty()) {
            None => self.default_payload(),
            Some(bytes) => serde_json::from_slice(bytes).map_err(TaskError::permanent)?,
        };
        self.run(&payload).await?;
        Ok(())
    }
}
