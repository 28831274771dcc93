//! Retry/skip classification.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Error;
use crate::provider::{DEFAULT_PERMANENT_STATUSES, ProviderApiError};

/// Handler failure tagged with whether the queue may retry it.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Transient; the queue reschedules with its own backoff.
    #[error("{0}")]
    Retryable(Error),
    /// The queue records the failure and does not reschedule.
    #[error("permanent failure: {0}")]
    Permanent(Error),
}

impl TaskError {
    pub fn permanent(err: impl Into<Error>) -> Self {
        Self::Permanent(err.into())
    }

    pub fn retryable(err: impl Into<Error>) -> Self {
        Self::Retryable(err.into())
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    pub fn inner(&self) -> &Error {
        match self {
            Self::Retryable(e) | Self::Permanent(e) => e,
        }
    }

    pub fn into_inner(self) -> Error {
        match self {
            Self::Retryable(e) | Self::Permanent(e) => e,
        }
    }
}

/// Untagged errors are retryable.
impl From<Error> for TaskError {
    fn from(err: Error) -> Self {
        Self::Retryable(err)
    }
}

/// Status code of the first provider API error in `err`'s cause chain.
pub fn provider_status(err: &Error) -> Option<u16> {
    if let Error::Provider(api) = err {
        return Some(api.status);
    }
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(api) = cause.downcast_ref::<ProviderApiError>() {
            return Some(api.status);
        }
        if let Some(Error::Provider(api)) = cause.downcast_ref::<Error>() {
            return Some(api.status);
        }
        source = cause.source();
    }
    None
}

/// Decides which errors the queue must not retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Provider status codes that no amount of retrying will fix.
    #[serde(default = "default_permanent_statuses")]
    pub permanent_statuses: Vec<u16>,
}

fn default_permanent_statuses() -> Vec<u16> {
    DEFAULT_PERMANENT_STATUSES.to_vec()
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_permanent_statuses(statuses: &[u16]) -> Self {
        Self {
            permanent_statuses: statuses.to_vec(),
        }
    }

    pub fn is_permanent_status(&self, status: u16) -> bool {
        self.permanent_statuses.contains(&status)
    }

    /// Tag `err` as retryable or permanent.
    ///
    /// Payload, validation and missing-registration errors are always
    /// permanent. Provider errors are permanent only when their status is
    /// on the allow-list. Everything else, storage errors included, is
    /// retryable.
    pub fn classify(&self, err: Error) -> TaskError {
        match &err {
            Error::Validation(_)
            | Error::Configuration(_)
            | Error::NotFound { .. }
            | Error::Registry(_)
            | Error::Serialization(_) => TaskError::Permanent(err),
            _ => match provider_status(&err) {
                Some(status) if self.is_permanent_status(status) => TaskError::Permanent(err),
                _ => TaskError::Retryable(err),
            },
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            permanent_statuses: default_permanent_statuses(),
        }
    }
}
