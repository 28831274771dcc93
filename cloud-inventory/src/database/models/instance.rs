//! Compute instance rows.

use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::{FromRow, Sqlite};

use crate::clients::ClientScope;
use crate::database::schema::{BindRow, Resource, TableSchema};

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct InstanceRecord {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub scope: ClientScope,
    pub instance_id: String,
    /// Natural id of the subnet the primary interface is attached to.
    pub subnet_id: Option<String>,
    pub name: String,
    pub machine_type: Option<String>,
    pub status: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BindRow for InstanceRecord {
    fn bind_row<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        self.scope.bind_columns(row);
        row.push_bind(self.instance_id.clone())
            .push_bind(self.subnet_id.clone())
            .push_bind(self.name.clone())
            .push_bind(self.machine_type.clone())
            .push_bind(self.status.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }
}

impl Resource for InstanceRecord {
    const MODEL: &'static str = "instances";
    const SCHEMA: TableSchema = TableSchema {
        table: "instances",
        columns: &[
            "credential",
            "project",
            "domain",
            "region",
            "instance_id",
            "subnet_id",
            "name",
            "machine_type",
            "status",
            "created_at",
            "updated_at",
        ],
        conflict: &["credential", "project", "domain", "region", "instance_id"],
        mutable: &["subnet_id", "name", "machine_type", "status"],
    };
}
