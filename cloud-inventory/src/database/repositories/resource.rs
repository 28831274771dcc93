//! Parent lookups for nested collectors.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::clients::ClientScope;
use crate::database::schema::Resource;

/// Enumerates persisted parent rows for a scope.
///
/// Nested collectors (subnets per network, ...) fan out one task per
/// parent returned here, so they only see parents an earlier collector pass
/// has already stored.
#[async_trait]
pub trait ParentSource: Send + Sync {
    /// Natural ids of the parents stored for `scope`.
    async fn parent_ids(&self, scope: &ClientScope) -> Result<Vec<String>>;
}

/// Reads parent natural ids straight from a resource table.
pub struct SqlxParentSource {
    pool: SqlitePool,
    table: &'static str,
    id_column: &'static str,
}

impl SqlxParentSource {
    pub fn new(pool: SqlitePool, table: &'static str, id_column: &'static str) -> Self {
        Self {
            pool,
            table,
            id_column,
        }
    }

    /// Parent source over another resource kind's table.
    pub fn for_resource<R: Resource>(pool: SqlitePool, id_column: &'static str) -> Self {
        Self::new(pool, R::SCHEMA.table, id_column)
    }
}

#[async_trait]
impl ParentSource for SqlxParentSource {
    async fn parent_ids(&self, scope: &ClientScope) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {col} FROM {table} \
             WHERE credential = ? AND project = ? AND domain = ? AND region = ? \
             ORDER BY {col}",
            col = self.id_column,
            table = self.table,
        );
        let ids: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(&scope.credential)
            .bind(&scope.project)
            .bind(&scope.domain)
            .bind(&scope.region)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}
