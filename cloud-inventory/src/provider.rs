//! Provider adapter contract.
//!
//! Adapters own everything provider specific: authenticating a client for a
//! scope, paging through a listing API, and mapping native items into rows.
//! The collector only sees the traits in this module.

use async_trait::async_trait;
use thiserror::Error;

use crate::Result;
use crate::collector::CollectTarget;
use crate::database::schema::Resource;

/// Status codes treated as permanent when an adapter does not override them.
pub const DEFAULT_PERMANENT_STATUSES: &[u16] = &[404];

/// Structured error returned by a provider API.
#[derive(Debug, Clone, Error)]
#[error("{provider} API error (status {status}): {message}")]
pub struct ProviderApiError {
    pub provider: String,
    pub status: u16,
    /// Provider specific error code, when the API sends one.
    pub code: Option<String>,
    pub message: String,
}

impl ProviderApiError {
    pub fn new(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            status,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// One provider listing, consumed page by page.
#[async_trait]
pub trait PageIterator<T: Send>: Send {
    /// Fetch the next page, or `None` once the listing is exhausted.
    async fn next_page(&mut self) -> Result<Option<Vec<T>>>;
}

/// Pages that are already in memory.
///
/// Handy for SDKs that return a whole listing in one call.
pub struct StaticPages<T> {
    pages: std::vec::IntoIter<Vec<T>>,
}

impl<T> StaticPages<T> {
    pub fn new(pages: Vec<Vec<T>>) -> Self {
        Self {
            pages: pages.into_iter(),
        }
    }

    pub fn single(items: Vec<T>) -> Self {
        Self::new(vec![items])
    }
}

#[async_trait]
impl<T: Send> PageIterator<T> for StaticPages<T> {
    async fn next_page(&mut self) -> Result<Option<Vec<T>>> {
        Ok(self.pages.next())
    }
}

/// Maps one provider resource kind onto a row type.
#[async_trait]
pub trait ResourceAdapter: Send + Sync + 'static {
    /// Authenticated client handle produced outside the core.
    type Client: Send + Sync + 'static;
    /// Provider-native listing item.
    type Item: Send + 'static;
    /// Row persisted for each item.
    type Record: Resource;

    /// Task type name, also used as the metric name.
    fn task_type(&self) -> &'static str;

    /// Start a listing for the client, optionally under a parent resource.
    async fn list(
        &self,
        client: &Self::Client,
        parent: Option<&str>,
    ) -> Result<Box<dyn PageIterator<Self::Item>>>;

    /// Map one item to a row stamped with `now_ms`.
    fn to_record(
        &self,
        item: Self::Item,
        target: &CollectTarget,
        now_ms: i64,
    ) -> Result<Self::Record>;

    /// Status codes that will never succeed on retry for this provider.
    fn permanent_statuses(&self) -> &[u16] {
        DEFAULT_PERMANENT_STATUSES
    }
}
