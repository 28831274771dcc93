//! Subnet rows, collected per already-persisted network.

use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::{FromRow, Sqlite};

use crate::clients::ClientScope;
use crate::database::schema::{BindRow, Resource, TableSchema};

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SubnetRecord {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub scope: ClientScope,
    /// Natural id of the parent network.
    pub network_id: String,
    pub subnet_id: String,
    pub name: String,
    pub cidr: Option<String>,
    pub zone: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BindRow for SubnetRecord {
    fn bind_row<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        self.scope.bind_columns(row);
        row.push_bind(self.network_id.clone())
            .push_bind(self.subnet_id.clone())
            .push_bind(self.name.clone())
            .push_bind(self.cidr.clone())
            .push_bind(self.zone.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }
}

impl Resource for SubnetRecord {
    const MODEL: &'static str = "subnets";
    const SCHEMA: TableSchema = TableSchema {
        table: "subnets",
        columns: &[
            "credential",
            "project",
            "domain",
            "region",
            "network_id",
            "subnet_id",
            "name",
            "cidr",
            "zone",
            "created_at",
            "updated_at",
        ],
        conflict: &[
            "credential",
            "project",
            "domain",
            "region",
            "network_id",
            "subnet_id",
        ],
        mutable: &["name", "cidr", "zone"],
    };
}
