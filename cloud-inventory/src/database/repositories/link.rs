//! Link table repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::LinkRecord;
use crate::database::upsert::bulk_upsert;
use crate::linker::LinkSpec;

#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// `(child id, parent id)` for every child whose parent row exists.
    async fn resolved_pairs(&self, spec: &LinkSpec) -> Result<Vec<(i64, i64)>>;
    /// Upsert link rows; only `updated_at` changes on conflict.
    async fn upsert_links(&self, spec: &LinkSpec, links: &[LinkRecord]) -> Result<u64>;
    async fn count_links(&self, spec: &LinkSpec) -> Result<i64>;
}

pub struct SqlxLinkRepository {
    pool: SqlitePool,
}

impl SqlxLinkRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkRepository for SqlxLinkRepository {
    async fn resolved_pairs(&self, spec: &LinkSpec) -> Result<Vec<(i64, i64)>> {
        let pairs = sqlx::query_as::<_, (i64, i64)>(&spec.select_sql())
            .fetch_all(&self.pool)
            .await?;
        Ok(pairs)
    }

    async fn upsert_links(&self, spec: &LinkSpec, links: &[LinkRecord]) -> Result<u64> {
        bulk_upsert(&self.pool, &spec.schema, links).await
    }

    async fn count_links(&self, spec: &LinkSpec) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", spec.schema.table);
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}
