//! Retention deletes and the housekeeper audit trail.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::HousekeeperRunDbModel;
use crate::database::schema::ModelDescriptor;

#[async_trait]
pub trait HousekeepingRepository: Send + Sync {
    /// Delete rows whose update timestamp is strictly before `cutoff_ms`.
    async fn delete_stale(&self, model: &ModelDescriptor, cutoff_ms: i64) -> Result<u64>;
    async fn record_run(
        &self,
        model: &str,
        started_at: i64,
        completed_at: i64,
        deleted_count: u64,
    ) -> Result<i64>;
    async fn list_runs(&self, model: Option<&str>, limit: i64)
    -> Result<Vec<HousekeeperRunDbModel>>;
}

pub struct SqlxHousekeepingRepository {
    pool: SqlitePool,
}

impl SqlxHousekeepingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HousekeepingRepository for SqlxHousekeepingRepository {
    async fn delete_stale(&self, model: &ModelDescriptor, cutoff_ms: i64) -> Result<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE {} < ?",
            model.table, model.updated_column
        );
        let result = sqlx::query(&sql)
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn record_run(
        &self,
        model: &str,
        started_at: i64,
        completed_at: i64,
        deleted_count: u64,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO housekeeper_runs (model, started_at, completed_at, deleted_count)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(model)
        .bind(started_at)
        .bind(completed_at)
        .bind(i64::try_from(deleted_count).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn list_runs(
        &self,
        model: Option<&str>,
        limit: i64,
    ) -> Result<Vec<HousekeeperRunDbModel>> {
        let runs = match model {
            Some(model) => {
                sqlx::query_as::<_, HousekeeperRunDbModel>(
                    "SELECT * FROM housekeeper_runs WHERE model = ? ORDER BY id DESC LIMIT ?",
                )
                .bind(model)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, HousekeeperRunDbModel>(
                    "SELECT * FROM housekeeper_runs ORDER BY id DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(runs)
    }
}
