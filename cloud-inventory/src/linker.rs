//! Relationship tables derived from collected rows.
//!
//! Each [`LinkSpec`] joins a child resource table to its parent table on the
//! scope columns plus a natural-id column pair, and upserts the resolved
//! surrogate-id pairs. Children whose parent has not been collected yet are
//! simply not linked until a later run.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::clients::SCOPE_COLUMNS;
use crate::database::models::LinkRecord;
use crate::database::repositories::LinkRepository;
use crate::database::schema::TableSchema;
use crate::database::time::now_ms;
use crate::metrics::{DynamicMetrics, MetricDescriptor};
use crate::registry::RegistryError;
use crate::task::{TaskContext, TaskError, TaskHandler};
use crate::{Error, Result};

/// Task type of the parameterless linker task.
pub const LINK_ALL: &str = "link-all";

/// One child-to-parent relationship.
#[derive(Debug, Clone, Copy)]
pub struct LinkSpec {
    pub name: &'static str,
    /// Link table; columns are `[child, parent, created_at, updated_at]`.
    pub schema: TableSchema,
    pub child_table: &'static str,
    pub parent_table: &'static str,
    /// `(child column, parent column)` pairs joined in addition to the scope.
    pub join_on: &'static [(&'static str, &'static str)],
}

impl LinkSpec {
    /// Inner join yielding `(child.id, parent.id)` for resolved pairs only.
    pub fn select_sql(&self) -> String {
        let conditions = SCOPE_COLUMNS
            .iter()
            .map(|col| (*col, *col))
            .chain(self.join_on.iter().copied())
            .map(|(c, p)| format!("c.{c} = p.{p}"))
            .collect::<Vec<_>>()
            .join(" AND ");
        format!(
            "SELECT c.id, p.id FROM {} c JOIN {} p ON {} ORDER BY c.id, p.id",
            self.child_table, self.parent_table, conditions
        )
    }
}

/// Subnets to the network they belong to.
pub const SUBNET_NETWORKS: LinkSpec = LinkSpec {
    name: "subnet_networks",
    schema: TableSchema {
        table: "subnet_networks",
        columns: &["subnet_id", "network_id", "created_at", "updated_at"],
        conflict: &["subnet_id", "network_id"],
        mutable: &[],
    },
    child_table: "subnets",
    parent_table: "networks",
    join_on: &[("network_id", "network_id")],
};

/// Instances to the subnet they are attached to.
pub const INSTANCE_SUBNETS: LinkSpec = LinkSpec {
    name: "instance_subnets",
    schema: TableSchema {
        table: "instance_subnets",
        columns: &["instance_id", "subnet_id", "created_at", "updated_at"],
        conflict: &["instance_id", "subnet_id"],
        mutable: &[],
    },
    child_table: "instances",
    parent_table: "subnets",
    join_on: &[("subnet_id", "subnet_id")],
};

/// Runs link specs in registration order.
pub struct Linker {
    repo: Arc<dyn LinkRepository>,
    metrics: Arc<DynamicMetrics>,
    specs: Vec<LinkSpec>,
}

impl Linker {
    pub fn new(repo: Arc<dyn LinkRepository>, metrics: Arc<DynamicMetrics>) -> Self {
        Self {
            repo,
            metrics,
            specs: Vec::new(),
        }
    }

    /// Linker with the built-in relationships.
    pub fn with_default_specs(repo: Arc<dyn LinkRepository>, metrics: Arc<DynamicMetrics>) -> Self {
        let mut linker = Self::new(repo, metrics);
        linker.specs = vec![SUBNET_NETWORKS, INSTANCE_SUBNETS];
        linker
    }

    pub fn add_spec(&mut self, spec: LinkSpec) -> std::result::Result<(), RegistryError> {
        if self.specs.iter().any(|s| s.name == spec.name) {
            return Err(RegistryError::Duplicate {
                registry: "link specs",
                key: spec.name.to_string(),
            });
        }
        self.specs.push(spec);
        Ok(())
    }

    pub fn specs(&self) -> &[LinkSpec] {
        &self.specs
    }

    pub fn metric_descriptor() -> MetricDescriptor {
        MetricDescriptor::new(LINK_ALL, "Link rows upserted by the latest link run", &["link"])
    }

    /// Link one relationship. Returns the number of rows upserted.
    pub async fn link_one(&self, spec: &LinkSpec) -> Result<u64> {
        let now = now_ms();
        let links: Vec<LinkRecord> = self
            .repo
            .resolved_pairs(spec)
            .await?
            .into_iter()
            .map(|(child_id, parent_id)| LinkRecord {
                child_id,
                parent_id,
                created_at: now,
                updated_at: now,
            })
            .collect();

        let count = self.repo.upsert_links(spec, &links).await?;
        if let Err(e) = self.metrics.record(LINK_ALL, &[spec.name], count as f64) {
            warn!(link = spec.name, error = %e, "Failed to record link metric");
        }
        info!(link = spec.name, count, "Linked resources");
        Ok(count)
    }

    /// Run every spec; a failing spec does not stop the rest.
    ///
    /// Returns the total row count, or every failure joined.
    pub async fn link_all(&self) -> Result<u64> {
        let mut total = 0u64;
        let mut errors = Vec::new();
        for spec in &self.specs {
            match self.link_one(spec).await {
                Ok(count) => total += count,
                Err(e) => {
                    error!(link = spec.name, error = %e, "Link failed");
                    errors.push(e);
                }
            }
        }
        Error::join(errors)?;
        Ok(total)
    }
}

#[async_trait]
impl TaskHandler for Linker {
    fn task_type(&self) -> &str {
        LINK_ALL
    }

    async fn handle(
        &self,
        _ctx: &TaskContext,
        _payload: Option<&[u8]>,
    ) -> std::result::Result<(), TaskError> {
        self.link_all().await?;
        Ok(())
    }
}
