//! Link rows: one resolved (child, parent) pair.

use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::{FromRow, Sqlite};

use crate::database::schema::BindRow;

/// Surrogate-id pair plus audit timestamps.
///
/// The column names differ per link table, so the schema lives on the
/// linker's spec rather than on this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LinkRecord {
    pub child_id: i64,
    pub parent_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BindRow for LinkRecord {
    fn bind_row<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.child_id)
            .push_bind(self.parent_id)
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }
}
