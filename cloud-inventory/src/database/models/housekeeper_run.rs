//! Housekeeper audit rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One retention entry processed by one sweep. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct HousekeeperRunDbModel {
    pub id: i64,
    pub model: String,
    /// Unix epoch milliseconds.
    pub started_at: i64,
    /// Unix epoch milliseconds.
    pub completed_at: i64,
    pub deleted_count: i64,
}
