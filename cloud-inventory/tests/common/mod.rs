//! Shared fixtures: a file-backed database and a fake provider.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cloud_inventory::Result;
use cloud_inventory::clients::{ClientDirectory, ClientScope, ScopedClient};
use cloud_inventory::collector::{CollectTarget, Collector, collect_metric_descriptor};
use cloud_inventory::database::models::{InstanceRecord, NetworkRecord, SubnetRecord};
use cloud_inventory::database::{self, DbPool};
use cloud_inventory::metrics::DynamicMetrics;
use cloud_inventory::provider::{PageIterator, ProviderApiError, ResourceAdapter};
use cloud_inventory::task::{TaskId, TaskQueue};
use tempfile::TempDir;

/// Migrated SQLite database in a temporary directory.
///
/// The directory must outlive the pool.
pub async fn setup_test_db() -> (TempDir, DbPool) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("inventory.db");
    let db_url = format!(
        "sqlite:{}?mode=rwc",
        db_path.to_string_lossy().replace('\\', "/")
    );

    let pool = database::init_pool(&db_url).await.unwrap();
    database::run_migrations(&pool).await.unwrap();
    (dir, pool)
}

pub async fn count_rows(pool: &DbPool, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap();
    count
}

#[derive(Debug, Clone)]
pub struct FakeItem {
    pub id: String,
    pub name: String,
    /// Natural id of the referenced resource, if any.
    pub reference: Option<String>,
}

impl FakeItem {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: format!("{id}-name"),
            reference: None,
        }
    }

    pub fn referencing(id: &str, reference: &str) -> Self {
        Self {
            reference: Some(reference.to_string()),
            ..Self::new(id)
        }
    }
}

/// An in-memory provider account.
#[derive(Debug, Clone, Default)]
pub struct FakeCloud {
    /// Network listing, one entry per page.
    pub networks: Vec<Vec<FakeItem>>,
    /// Subnets keyed by network id.
    pub subnets: HashMap<String, Vec<FakeItem>>,
    pub instances: Vec<FakeItem>,
    /// Serve this many pages, then fail with the given status.
    pub fail_after: Option<(usize, u16)>,
}

impl FakeCloud {
    pub fn with_networks(ids: &[&str]) -> Self {
        Self {
            networks: vec![ids.iter().map(|id| FakeItem::new(id)).collect()],
            ..Default::default()
        }
    }
}

pub struct FakePages {
    pages: std::vec::IntoIter<Vec<FakeItem>>,
    served: usize,
    fail_after: Option<(usize, u16)>,
}

impl FakePages {
    pub fn new(pages: Vec<Vec<FakeItem>>, fail_after: Option<(usize, u16)>) -> Self {
        Self {
            pages: pages.into_iter(),
            served: 0,
            fail_after,
        }
    }
}

#[async_trait]
impl PageIterator<FakeItem> for FakePages {
    async fn next_page(&mut self) -> Result<Option<Vec<FakeItem>>> {
        if let Some((limit, status)) = self.fail_after {
            if self.served >= limit {
                return Err(ProviderApiError::new("fake", status, "listing failed").into());
            }
        }
        self.served += 1;
        Ok(self.pages.next())
    }
}

pub struct NetworkAdapter;

#[async_trait]
impl ResourceAdapter for NetworkAdapter {
    type Client = FakeCloud;
    type Item = FakeItem;
    type Record = NetworkRecord;

    fn task_type(&self) -> &'static str {
        "fake.networks"
    }

    async fn list(
        &self,
        client: &FakeCloud,
        _parent: Option<&str>,
    ) -> Result<Box<dyn PageIterator<FakeItem>>> {
        Ok(Box::new(FakePages::new(client.networks.clone(), client.fail_after)))
    }

    fn to_record(
        &self,
        item: FakeItem,
        target: &CollectTarget,
        now_ms: i64,
    ) -> Result<NetworkRecord> {
        Ok(NetworkRecord {
            scope: target.scope.clone(),
            network_id: item.id,
            name: item.name,
            cidr: Some("10.0.0.0/16".to_string()),
            state: Some("available".to_string()),
            created_at: now_ms,
            updated_at: now_ms,
        })
    }
}

pub struct SubnetAdapter;

#[async_trait]
impl ResourceAdapter for SubnetAdapter {
    type Client = FakeCloud;
    type Item = FakeItem;
    type Record = SubnetRecord;

    fn task_type(&self) -> &'static str {
        "fake.subnets"
    }

    async fn list(
        &self,
        client: &FakeCloud,
        parent: Option<&str>,
    ) -> Result<Box<dyn PageIterator<FakeItem>>> {
        let items = parent
            .and_then(|network| client.subnets.get(network))
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(FakePages::new(vec![items], None)))
    }

    fn to_record(
        &self,
        item: FakeItem,
        target: &CollectTarget,
        now_ms: i64,
    ) -> Result<SubnetRecord> {
        Ok(SubnetRecord {
            scope: target.scope.clone(),
            network_id: target.parent.clone().unwrap_or_default(),
            subnet_id: item.id,
            name: item.name,
            cidr: None,
            zone: Some("zone-a".to_string()),
            created_at: now_ms,
            updated_at: now_ms,
        })
    }
}

pub struct InstanceAdapter;

#[async_trait]
impl ResourceAdapter for InstanceAdapter {
    type Client = FakeCloud;
    type Item = FakeItem;
    type Record = InstanceRecord;

    fn task_type(&self) -> &'static str {
        "fake.instances"
    }

    async fn list(
        &self,
        client: &FakeCloud,
        _parent: Option<&str>,
    ) -> Result<Box<dyn PageIterator<FakeItem>>> {
        Ok(Box::new(FakePages::new(vec![client.instances.clone()], None)))
    }

    fn to_record(
        &self,
        item: FakeItem,
        target: &CollectTarget,
        now_ms: i64,
    ) -> Result<InstanceRecord> {
        Ok(InstanceRecord {
            scope: target.scope.clone(),
            instance_id: item.id,
            subnet_id: item.reference,
            name: item.name,
            machine_type: Some("small".to_string()),
            status: Some("running".to_string()),
            created_at: now_ms,
            updated_at: now_ms,
        })
    }
}

pub fn directory(clouds: Vec<(ClientScope, FakeCloud)>) -> Arc<ClientDirectory<FakeCloud>> {
    let mut directory = ClientDirectory::new();
    for (scope, cloud) in clouds {
        directory
            .register(scope.clone(), ScopedClient::new(cloud, scope))
            .unwrap();
    }
    Arc::new(directory)
}

/// Metrics sink with descriptors for the given top-level collector types.
pub fn metrics_for(task_types: &[&str]) -> Arc<DynamicMetrics> {
    metrics_with_nested(task_types, &[])
}

/// Metrics sink for top-level and nested collector types.
pub fn metrics_with_nested(top_level: &[&str], nested: &[&str]) -> Arc<DynamicMetrics> {
    let mut metrics = DynamicMetrics::new();
    for task_type in top_level {
        metrics
            .describe(collect_metric_descriptor(task_type, false))
            .unwrap();
    }
    for task_type in nested {
        metrics
            .describe(collect_metric_descriptor(task_type, true))
            .unwrap();
    }
    Arc::new(metrics)
}

pub fn network_collector(
    pool: &DbPool,
    queue: Arc<dyn TaskQueue>,
    clients: Arc<ClientDirectory<FakeCloud>>,
    metrics: Arc<DynamicMetrics>,
) -> Collector<NetworkAdapter> {
    Collector::new(NetworkAdapter, clients, pool.clone(), queue, metrics)
}

/// Queue that rejects submissions for one scope's credential.
pub struct RejectingQueue {
    pub inner: Arc<cloud_inventory::task::MemoryQueue>,
    pub reject_credential: String,
}

#[async_trait]
impl TaskQueue for RejectingQueue {
    async fn submit(
        &self,
        task_type: &str,
        payload: Option<Vec<u8>>,
        queue: &str,
    ) -> Result<TaskId> {
        let rejected = payload
            .as_deref()
            .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(bytes).ok())
            .and_then(|v| v.get("credential").and_then(|c| c.as_str()).map(str::to_string))
            .is_some_and(|c| c == self.reject_credential);
        if rejected {
            return Err(cloud_inventory::Error::Queue("queue unavailable".to_string()));
        }
        self.inner.submit(task_type, payload, queue).await
    }
}
