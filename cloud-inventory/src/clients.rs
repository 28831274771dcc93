//! Scope-addressed client directory.
//!
//! Maps a credential scope to the authenticated client for it. The directory
//! is rebuilt from configuration outside the core and is read-only while
//! tasks run.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::Sqlite;
use sqlx::query_builder::Separated;

use crate::Error;
use crate::registry::{RangeError, Registry, RegistryError};
use crate::task::TaskError;

/// Credential scope selecting exactly one authenticated client.
///
/// Also stored verbatim as the scope columns of every resource row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct ClientScope {
    /// Name of the credential in configuration.
    pub credential: String,
    /// Tenant, subscription, account or project identifier.
    pub project: String,
    /// Domain or organisation; empty for providers without one.
    #[serde(default)]
    pub domain: String,
    pub region: String,
}

impl ClientScope {
    pub fn new(
        credential: impl Into<String>,
        project: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            credential: credential.into(),
            project: project.into(),
            domain: String::new(),
            region: region.into(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Metric label values, in `SCOPE_LABELS` order.
    pub fn label_values(&self) -> Vec<String> {
        vec![
            self.credential.clone(),
            self.project.clone(),
            self.domain.clone(),
            self.region.clone(),
        ]
    }

    /// Bind the four scope columns in table order.
    pub fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.credential.clone())
            .push_bind(self.project.clone())
            .push_bind(self.domain.clone())
            .push_bind(self.region.clone());
    }
}

impl fmt::Display for ClientScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.credential, self.project)?;
        if !self.domain.is_empty() {
            write!(f, "/{}", self.domain)?;
        }
        write!(f, "/{}", self.region)
    }
}

/// Label names matching [`ClientScope::label_values`].
pub const SCOPE_LABELS: &[&str] = &["credential", "project", "domain", "region"];

/// Scope columns shared by every resource table, in bind order.
pub const SCOPE_COLUMNS: &[&str] = &["credential", "project", "domain", "region"];

/// An authenticated client plus what observability needs to know about it.
#[derive(Debug)]
pub struct ScopedClient<C> {
    pub client: Arc<C>,
    pub credential: String,
    pub scope: ClientScope,
}

impl<C> ScopedClient<C> {
    pub fn new(client: C, scope: ClientScope) -> Self {
        Self {
            client: Arc::new(client),
            credential: scope.credential.clone(),
            scope,
        }
    }
}

/// Directory from scope key to client.
///
/// Providers with a flatter scope model use `K = String`. Such directories
/// serve provider-specific lookups only: [`crate::collector::Collector`]
/// addresses clients by [`ClientScope`] and needs the default key.
pub struct ClientDirectory<C, K = ClientScope> {
    registry: Registry<K, ScopedClient<C>>,
}

impl<C, K> ClientDirectory<C, K>
where
    K: Eq + Hash + fmt::Debug + fmt::Display,
{
    pub fn new() -> Self {
        Self {
            registry: Registry::new("clients"),
        }
    }

    pub fn register(&mut self, key: K, client: ScopedClient<C>) -> Result<(), RegistryError> {
        self.registry.register(key, client)
    }

    /// Resolve the client for `key`.
    ///
    /// A miss means no credential exists for the scope; retrying cannot
    /// help, so the error is permanent.
    pub fn lookup(&self, key: &K) -> Result<&ScopedClient<C>, TaskError> {
        self.registry
            .get(key)
            .ok_or_else(|| TaskError::Permanent(Error::not_found("client", key.to_string())))
    }

    pub fn exists(&self, key: &K) -> bool {
        self.registry.exists(key)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn range<E, F>(&self, f: F) -> Result<Vec<E>, E>
    where
        E: fmt::Display,
        F: FnMut(&K, &ScopedClient<C>) -> Result<(), RangeError<E>>,
    {
        self.registry.range(f)
    }
}

impl<C, K> Default for ClientDirectory<C, K>
where
    K: Eq + Hash + fmt::Debug + fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C, K> fmt::Debug for ClientDirectory<C, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientDirectory")
            .field("registry", &self.registry)
            .finish()
    }
}
