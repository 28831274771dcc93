//! Idempotent bulk upsert.

use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use super::DbPool;
use super::schema::{BindRow, TableSchema};
use crate::Result;

/// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER` since 3.32.
const SQLITE_MAX_BIND_PARAMS: usize = 32_766;

/// Insert-or-update `rows` keyed by the schema's conflict columns.
///
/// Returns the number of rows inserted or updated. Large batches are split to
/// stay under the bind parameter limit; the pieces commit together, so the
/// call is still a single atomic write.
pub async fn bulk_upsert<R: BindRow>(
    pool: &DbPool,
    schema: &TableSchema,
    rows: &[R],
) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let chunk_size = (SQLITE_MAX_BIND_PARAMS / schema.columns.len().max(1)).max(1);
    let conflict_clause = schema.conflict_clause();

    let mut tx = pool.begin().await?;
    let mut affected = 0u64;
    for chunk in rows.chunks(chunk_size) {
        let mut builder = QueryBuilder::<Sqlite>::new(schema.insert_prefix());
        builder.push_values(chunk, |mut row, record| record.bind_row(&mut row));
        builder.push(&conflict_clause);
        affected += builder.build().execute(&mut *tx).await?.rows_affected();
    }
    tx.commit().await?;

    debug!(table = schema.table, rows = rows.len(), affected, "Bulk upsert");
    Ok(affected)
}
