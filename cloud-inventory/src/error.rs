//! Application-wide error types.

use thiserror::Error;

use crate::provider::ProviderApiError;
use crate::registry::RegistryError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Provider(#[from] ProviderApiError),

    /// Adapter failure wrapping an SDK error; its cause chain is kept so a
    /// provider status buried inside can still be classified.
    #[error("{context}: {source}")]
    Adapter {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Task cancelled")]
    Cancelled,

    #[error("{}", join_messages(.0))]
    Joined(Vec<Error>),

    #[error("{0}")]
    Other(String),
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn adapter(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Adapter {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Collapse accumulated errors into a single result.
    ///
    /// An empty list is success and a single error is returned as-is.
    pub fn join(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Joined(errors)),
        }
    }

    /// Number of underlying failures this error stands for.
    pub fn failure_count(&self) -> usize {
        match self {
            Self::Joined(errors) => errors.iter().map(Error::failure_count).sum(),
            _ => 1,
        }
    }
}
