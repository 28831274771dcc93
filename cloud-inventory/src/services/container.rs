//! Service container and bootstrap.
//!
//! Everything tasks share (pool, queue, metrics, model registry, handler
//! table) is assembled here once and handed out explicitly.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Result;
use crate::clients::ClientDirectory;
use crate::collector::{CollectAllTask, Collector, collect_metric_descriptor};
use crate::config::InventoryConfig;
use crate::database::models::{InstanceRecord, NetworkRecord, SubnetRecord};
use crate::database::repositories::{
    ParentSource, SqlxHousekeepingRepository, SqlxLinkRepository, SqlxParentSource,
};
use crate::database::schema::Resource;
use crate::housekeeper::{Housekeeper, ModelRegistry};
use crate::linker::{LinkSpec, Linker};
use crate::metrics::{DynamicMetrics, PrometheusExporter};
use crate::provider::ResourceAdapter;
use crate::registry::RegistryError;
use crate::task::{DEFAULT_QUEUE, Dispatcher, TaskHandler, TaskQueue};

/// Shared services handed to handler factories at build time.
struct Shared {
    pool: SqlitePool,
    queue: Arc<dyn TaskQueue>,
    queue_name: String,
    metrics: Arc<DynamicMetrics>,
}

type HandlerFactory = Box<dyn FnOnce(&Shared) -> Arc<dyn TaskHandler>>;

/// Central registration table.
///
/// Metric descriptors and models are registered as collectors are added;
/// handlers are constructed in [`Bootstrap::build`] once the shared metrics
/// sink is frozen.
pub struct Bootstrap {
    pool: SqlitePool,
    queue: Arc<dyn TaskQueue>,
    queue_name: String,
    retention: Duration,
    metrics: DynamicMetrics,
    models: ModelRegistry,
    factories: Vec<HandlerFactory>,
    collector_types: Vec<String>,
    link_specs: Option<Vec<LinkSpec>>,
    housekeeper: bool,
}

impl Bootstrap {
    /// Start a registration table with the built-in resource models.
    pub fn new(pool: SqlitePool, queue: Arc<dyn TaskQueue>) -> Self {
        let mut bootstrap = Self {
            pool,
            queue,
            queue_name: DEFAULT_QUEUE.to_string(),
            retention: InventoryConfig::default().retention,
            metrics: DynamicMetrics::new(),
            models: ModelRegistry::new("models"),
            factories: Vec::new(),
            collector_types: Vec::new(),
            link_specs: None,
            housekeeper: false,
        };
        bootstrap.register_model::<NetworkRecord>();
        bootstrap.register_model::<SubnetRecord>();
        bootstrap.register_model::<InstanceRecord>();
        bootstrap
    }

    /// Apply queue name and default retention from configuration.
    pub fn configure(mut self, config: &InventoryConfig) -> Self {
        self.queue_name = config.queue.clone();
        self.retention = config.retention;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Make `R` known to the housekeeper. Registering twice is a no-op.
    pub fn register_model<R: Resource>(&mut self) {
        let key = R::MODEL.to_string();
        if !self.models.exists(&key) {
            self.models.must_register(key, R::descriptor());
        }
    }

    /// Add a top-level collector fanning out over every client scope.
    pub fn register_collector<A: ResourceAdapter>(
        &mut self,
        adapter: A,
        clients: Arc<ClientDirectory<A::Client>>,
    ) -> Result<()> {
        self.add_collector(adapter, clients, None)
    }

    /// Add a nested collector fanning out over the stored `P` rows of each
    /// scope, identified by `parent_id_column`.
    pub fn register_nested_collector<A: ResourceAdapter, P: Resource>(
        &mut self,
        adapter: A,
        clients: Arc<ClientDirectory<A::Client>>,
        parent_id_column: &'static str,
    ) -> Result<()> {
        let parents: Arc<dyn ParentSource> = Arc::new(SqlxParentSource::for_resource::<P>(
            self.pool.clone(),
            parent_id_column,
        ));
        self.add_collector(adapter, clients, Some(parents))
    }

    fn add_collector<A: ResourceAdapter>(
        &mut self,
        adapter: A,
        clients: Arc<ClientDirectory<A::Client>>,
        parents: Option<Arc<dyn ParentSource>>,
    ) -> Result<()> {
        let task_type = adapter.task_type().to_string();
        if self.collector_types.contains(&task_type) {
            return Err(RegistryError::Duplicate {
                registry: "collectors",
                key: task_type,
            }
            .into());
        }

        self.metrics
            .describe(collect_metric_descriptor(&task_type, parents.is_some()))?;
        self.register_model::<A::Record>();
        self.collector_types.push(task_type);

        self.factories.push(Box::new(move |shared: &Shared| {
            let mut collector = Collector::new(
                adapter,
                clients,
                shared.pool.clone(),
                shared.queue.clone(),
                shared.metrics.clone(),
            )
            .with_queue_name(shared.queue_name.clone());
            if let Some(parents) = parents {
                collector = collector.with_parents(parents);
            }
            Arc::new(collector) as Arc<dyn TaskHandler>
        }));
        Ok(())
    }

    /// Register the `link-all` task with the built-in link specs.
    pub fn with_linker(&mut self) -> Result<()> {
        if self.link_specs.is_none() {
            self.metrics.describe(Linker::metric_descriptor())?;
            self.link_specs = Some(Vec::new());
        }
        Ok(())
    }

    /// Append a link spec after the built-in ones. Enables the linker.
    pub fn add_link_spec(&mut self, spec: LinkSpec) -> Result<()> {
        self.with_linker()?;
        if let Some(specs) = self.link_specs.as_mut() {
            specs.push(spec);
        }
        Ok(())
    }

    /// Register the `housekeeper` task.
    pub fn with_housekeeper(&mut self) -> Result<()> {
        if !self.housekeeper {
            self.metrics.describe(Housekeeper::metric_descriptor())?;
            self.housekeeper = true;
        }
        Ok(())
    }

    /// Freeze the registries and construct every handler.
    pub fn build(self) -> Result<ServiceContainer> {
        let shared = Shared {
            pool: self.pool,
            queue: self.queue,
            queue_name: self.queue_name,
            metrics: Arc::new(self.metrics),
        };
        let models = Arc::new(self.models);

        let mut dispatcher = Dispatcher::new();
        for factory in self.factories {
            dispatcher.register(factory(&shared))?;
        }
        dispatcher.register(Arc::new(CollectAllTask::new(
            shared.queue.clone(),
            shared.queue_name.clone(),
            self.collector_types.clone(),
        )))?;

        if let Some(extra_specs) = self.link_specs {
            let mut linker = Linker::with_default_specs(
                Arc::new(SqlxLinkRepository::new(shared.pool.clone())),
                shared.metrics.clone(),
            );
            for spec in extra_specs {
                linker.add_spec(spec)?;
            }
            dispatcher.register(Arc::new(linker))?;
        }

        if self.housekeeper {
            dispatcher.register(Arc::new(Housekeeper::new(
                models.clone(),
                Arc::new(SqlxHousekeepingRepository::new(shared.pool.clone())),
                shared.metrics.clone(),
                self.retention,
            )))?;
        }

        info!(
            handlers = dispatcher.len(),
            collectors = self.collector_types.len(),
            models = models.len(),
            "Service container initialized"
        );

        Ok(ServiceContainer {
            pool: shared.pool,
            queue: shared.queue,
            queue_name: shared.queue_name,
            metrics: shared.metrics,
            models,
            dispatcher: Arc::new(dispatcher),
            collector_types: self.collector_types,
            cancellation_token: CancellationToken::new(),
        })
    }
}

/// Service container holding everything tasks share.
pub struct ServiceContainer {
    /// Database connection pool.
    pub pool: SqlitePool,
    /// Submission side of the task queue.
    pub queue: Arc<dyn TaskQueue>,
    pub queue_name: String,
    pub metrics: Arc<DynamicMetrics>,
    /// Models the housekeeper can sweep.
    pub models: Arc<ModelRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    /// Collector task types in registration order.
    pub collector_types: Vec<String>,
    /// Cancellation token for graceful shutdown.
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    pub fn exporter(&self) -> PrometheusExporter {
        PrometheusExporter::new(self.metrics.clone())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn shutdown(&self) {
        info!("Shutting down services");
        self.cancellation_token.cancel();
    }
}
