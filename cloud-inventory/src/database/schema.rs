//! Declarative table descriptions.
//!
//! The SQL lives in `migrations/`; these constants describe the same tables
//! to the upsert builder, the linker and the housekeeper.

use sqlx::Sqlite;
use sqlx::query_builder::Separated;

/// Audit column refreshed on every upsert and used for retention.
pub const UPDATED_AT: &str = "updated_at";

/// Column layout of one upsert target.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub table: &'static str,
    /// Insert column list, in the order [`BindRow::bind_row`] binds values.
    pub columns: &'static [&'static str],
    /// Natural uniqueness constraint used as the conflict target.
    pub conflict: &'static [&'static str],
    /// Columns refreshed on conflict. `updated_at` is always refreshed and
    /// must not be listed here.
    pub mutable: &'static [&'static str],
}

impl TableSchema {
    pub fn insert_prefix(&self) -> String {
        format!("INSERT INTO {} ({}) ", self.table, self.columns.join(", "))
    }

    pub fn conflict_clause(&self) -> String {
        let updates = self
            .mutable
            .iter()
            .copied()
            .chain(std::iter::once(UPDATED_AT))
            .map(|col| format!("{col} = excluded.{col}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            " ON CONFLICT ({}) DO UPDATE SET {}",
            self.conflict.join(", "),
            updates
        )
    }

    pub fn descriptor(&self, name: &'static str) -> ModelDescriptor {
        ModelDescriptor {
            name,
            table: self.table,
            updated_column: UPDATED_AT,
        }
    }
}

/// A row that can bind itself in [`TableSchema::columns`] order.
pub trait BindRow: Send + Sync {
    fn bind_row<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>);
}

/// A collected resource kind.
pub trait Resource: BindRow + 'static {
    /// Model name used by the housekeeper registry.
    const MODEL: &'static str;
    const SCHEMA: TableSchema;

    fn descriptor() -> ModelDescriptor {
        Self::SCHEMA.descriptor(Self::MODEL)
    }
}

/// What the housekeeper needs to know about a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: &'static str,
    pub table: &'static str,
    pub updated_column: &'static str,
}
