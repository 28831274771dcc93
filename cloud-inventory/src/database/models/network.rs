//! Network (VPC / virtual network) rows.

use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::{FromRow, Sqlite};

use crate::clients::ClientScope;
use crate::database::schema::{BindRow, Resource, TableSchema};

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct NetworkRecord {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub scope: ClientScope,
    /// Provider identifier, unique within the scope.
    pub network_id: String,
    pub name: String,
    pub cidr: Option<String>,
    pub state: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BindRow for NetworkRecord {
    fn bind_row<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        self.scope.bind_columns(row);
        row.push_bind(self.network_id.clone())
            .push_bind(self.name.clone())
            .push_bind(self.cidr.clone())
            .push_bind(self.state.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }
}

impl Resource for NetworkRecord {
    const MODEL: &'static str = "networks";
    const SCHEMA: TableSchema = TableSchema {
        table: "networks",
        columns: &[
            "credential",
            "project",
            "domain",
            "region",
            "network_id",
            "name",
            "cidr",
            "state",
            "created_at",
            "updated_at",
        ],
        conflict: &["credential", "project", "domain", "region", "network_id"],
        mutable: &["name", "cidr", "state"],
    };
}
