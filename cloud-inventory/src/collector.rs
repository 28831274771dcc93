//! Dual-mode collect tasks.
//!
//! A [`Collector`] is registered once per resource kind. Invoked without a
//! payload it fans out one concrete task per credential scope (or per stored
//! parent, for nested kinds); invoked with a payload it collects that one
//! scope and upserts the rows.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clients::{ClientDirectory, ClientScope, SCOPE_LABELS};
use crate::database::repositories::ParentSource;
use crate::database::schema::Resource;
use crate::database::time::now_ms;
use crate::database::{DbPool, bulk_upsert};
use crate::metrics::{DynamicMetrics, MetricDescriptor};
use crate::provider::ResourceAdapter;
use crate::registry::RangeError;
use crate::task::{
    DEFAULT_QUEUE, RetryPolicy, TaskContext, TaskError, TaskHandler, TaskQueue, submit_json,
};
use crate::{Error, Result};

/// Task type of the parameterless task that kicks off every collector.
pub const COLLECT_ALL: &str = "collect-all";

/// Payload of one concrete collect task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Natural id of the parent resource, for nested kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl CollectPayload {
    pub fn for_scope(scope: &ClientScope, parent: Option<String>) -> Self {
        Self {
            credential: Some(scope.credential.clone()),
            project: Some(scope.project.clone()),
            domain: (!scope.domain.is_empty()).then(|| scope.domain.clone()),
            region: Some(scope.region.clone()),
            parent,
        }
    }

    /// Validate and convert into a target.
    ///
    /// `credential`, `project` and `region` must be non-empty, and so must
    /// `parent` when `nested` is set.
    pub fn into_target(self, nested: bool) -> Result<CollectTarget> {
        let credential = required("credential", self.credential)?;
        let project = required("project", self.project)?;
        let region = required("region", self.region)?;
        let parent = if nested {
            Some(required("parent", self.parent)?)
        } else {
            self.parent.filter(|p| !p.is_empty())
        };

        let scope = ClientScope::new(credential, project, region)
            .with_domain(self.domain.unwrap_or_default());
        Ok(CollectTarget { scope, parent })
    }
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::validation(format!("missing required field '{field}'"))),
    }
}

/// Label added after the scope labels for nested collectors.
pub const PARENT_LABEL: &str = "parent";

/// Descriptor for the row count a collector records per scope, and per
/// parent when `nested`.
pub fn collect_metric_descriptor(task_type: &str, nested: bool) -> MetricDescriptor {
    let mut labels = SCOPE_LABELS.to_vec();
    if nested {
        labels.push(PARENT_LABEL);
    }
    MetricDescriptor::new(task_type, "Rows upserted by the latest collect run", &labels)
}

/// What one concrete collect task works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectTarget {
    pub scope: ClientScope,
    pub parent: Option<String>,
}

/// Generic collector for one resource kind.
pub struct Collector<A: ResourceAdapter> {
    adapter: A,
    clients: Arc<ClientDirectory<A::Client>>,
    pool: DbPool,
    queue: Arc<dyn TaskQueue>,
    metrics: Arc<DynamicMetrics>,
    queue_name: String,
    parents: Option<Arc<dyn ParentSource>>,
    policy: RetryPolicy,
}

impl<A: ResourceAdapter> Collector<A> {
    pub fn new(
        adapter: A,
        clients: Arc<ClientDirectory<A::Client>>,
        pool: DbPool,
        queue: Arc<dyn TaskQueue>,
        metrics: Arc<DynamicMetrics>,
    ) -> Self {
        let policy = RetryPolicy::with_permanent_statuses(adapter.permanent_statuses());
        Self {
            adapter,
            clients,
            pool,
            queue,
            metrics,
            queue_name: DEFAULT_QUEUE.to_string(),
            parents: None,
            policy,
        }
    }

    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    /// Make this a nested collector fanning out per stored parent.
    pub fn with_parents(mut self, parents: Arc<dyn ParentSource>) -> Self {
        self.parents = Some(parents);
        self
    }

    pub fn is_nested(&self) -> bool {
        self.parents.is_some()
    }

    pub fn metric_descriptor(&self) -> MetricDescriptor {
        collect_metric_descriptor(self.adapter.task_type(), self.is_nested())
    }

    /// Sample key labels for `target`, matching [`Self::metric_descriptor`].
    fn label_values(&self, target: &CollectTarget) -> Vec<String> {
        let mut values = target.scope.label_values();
        if self.is_nested() {
            values.push(target.parent.clone().unwrap_or_default());
        }
        values
    }

    /// Enqueue one concrete task per scope, or per scope and parent.
    ///
    /// A failed parent lookup or enqueue is logged and skipped. Returns the
    /// number of tasks enqueued.
    pub async fn fan_out(&self) -> Result<usize> {
        let task_type = self.adapter.task_type();

        let mut scopes = Vec::with_capacity(self.clients.len());
        self.clients.range(|_, client| {
            scopes.push(client.scope.clone());
            Ok::<(), RangeError<Error>>(())
        })?;
        scopes.sort_by_key(|s| s.to_string());

        let mut payloads = Vec::with_capacity(scopes.len());
        match &self.parents {
            None => payloads.extend(scopes.iter().map(|s| CollectPayload::for_scope(s, None))),
            Some(parents) => {
                for scope in &scopes {
                    match parents.parent_ids(scope).await {
                        Ok(ids) => payloads.extend(
                            ids.into_iter()
                                .map(|id| CollectPayload::for_scope(scope, Some(id))),
                        ),
                        Err(e) => {
                            warn!(
                                task_type,
                                scope = %scope,
                                error = %e,
                                "Parent lookup failed, skipping scope"
                            );
                        }
                    }
                }
            }
        }

        let mut enqueued = 0usize;
        for payload in &payloads {
            match submit_json(self.queue.as_ref(), task_type, payload, &self.queue_name).await {
                Ok(task_id) => {
                    debug!(task_type, task_id = %task_id, "Enqueued collect task");
                    enqueued += 1;
                }
                Err(e) => {
                    warn!(
                        task_type,
                        payload = ?payload,
                        error = %e,
                        "Failed to enqueue collect task, skipping"
                    );
                }
            }
        }

        info!(
            task_type,
            scopes = scopes.len(),
            enqueued,
            skipped = payloads.len() - enqueued,
            "Fan-out complete"
        );
        Ok(enqueued)
    }

    /// Collect one scope and upsert the result.
    ///
    /// Every page is fetched before anything is written; a failing page
    /// aborts the task with nothing persisted.
    pub async fn execute(
        &self,
        ctx: &TaskContext,
        payload: &[u8],
    ) -> std::result::Result<u64, TaskError> {
        let task_type = self.adapter.task_type();

        let payload: CollectPayload =
            serde_json::from_slice(payload).map_err(TaskError::permanent)?;
        let target = payload
            .into_target(self.is_nested())
            .map_err(TaskError::Permanent)?;
        let client = self.clients.lookup(&target.scope)?;

        let items = self
            .drain_pages(ctx, client.client.as_ref(), target.parent.as_deref())
            .await?;

        let now = now_ms();
        let records = items
            .into_iter()
            .map(|item| self.adapter.to_record(item, &target, now))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| self.policy.classify(e))?;

        let count = bulk_upsert(&self.pool, &<A::Record as Resource>::SCHEMA, &records).await?;

        if let Err(e) = self
            .metrics
            .record(task_type, &self.label_values(&target), count as f64)
        {
            warn!(task_type, error = %e, "Failed to record collect metric");
        }

        info!(
            task_type,
            scope = %target.scope,
            parent = target.parent.as_deref().unwrap_or(""),
            count,
            "Collected resources"
        );
        Ok(count)
    }

    async fn drain_pages(
        &self,
        ctx: &TaskContext,
        client: &A::Client,
        parent: Option<&str>,
    ) -> std::result::Result<Vec<A::Item>, TaskError> {
        let mut pages = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(TaskError::Retryable(Error::Cancelled)),
            listing = self.adapter.list(client, parent) => {
                listing.map_err(|e| self.policy.classify(e))?
            }
        };

        let mut items = Vec::new();
        let mut page_count = 0usize;
        loop {
            let page = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(TaskError::Retryable(Error::Cancelled)),
                page = pages.next_page() => page.map_err(|e| self.policy.classify(e))?,
            };
            match page {
                Some(batch) => {
                    page_count += 1;
                    items.extend(batch);
                }
                None => break,
            }
        }

        debug!(
            task_type = self.adapter.task_type(),
            pages = page_count,
            items = items.len(),
            "Listing drained"
        );
        Ok(items)
    }
}

#[async_trait]
impl<A: ResourceAdapter> TaskHandler for Collector<A> {
    fn task_type(&self) -> &str {
        self.adapter.task_type()
    }

    /// A missing or zero-length payload is the fan-out sentinel.
    async fn handle(
        &self,
        ctx: &TaskContext,
        payload: Option<&[u8]>,
    ) -> std::result::Result<(), TaskError> {
        match payload.filter(|bytes| !bytes.is_empty()) {
            None => self
                .fan_out()
                .await
                .map(|_| ())
                .map_err(|e| self.policy.classify(e)),
            Some(bytes) => self.execute(ctx, bytes).await.map(|_| ()),
        }
    }
}

/// Parameterless task submitting every collector with no payload.
pub struct CollectAllTask {
    queue: Arc<dyn TaskQueue>,
    queue_name: String,
    task_types: Vec<String>,
}

impl CollectAllTask {
    /// `task_types` are submitted in the given order.
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        queue_name: impl Into<String>,
        task_types: Vec<String>,
    ) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            task_types,
        }
    }

    pub fn task_types(&self) -> &[String] {
        &self.task_types
    }
}

#[async_trait]
impl TaskHandler for CollectAllTask {
    fn task_type(&self) -> &str {
        COLLECT_ALL
    }

    async fn handle(
        &self,
        _ctx: &TaskContext,
        _payload: Option<&[u8]>,
    ) -> std::result::Result<(), TaskError> {
        let mut submitted = 0usize;
        for task_type in &self.task_types {
            match self.queue.submit(task_type, None, &self.queue_name).await {
                Ok(_) => submitted += 1,
                Err(e) => {
                    warn!(task_type = %task_type, error = %e, "Failed to submit collector fan-out")
                }
            }
        }
        info!(submitted, total = self.task_types.len(), "Collect-all submitted");
        Ok(())
    }
}
