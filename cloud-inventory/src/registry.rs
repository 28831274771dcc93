//! Write-once, read-many named registry.
//!
//! Registries are populated during bootstrap through `&mut self` and then
//! shared behind an `Arc`, so readers never need a lock. Code that wants to
//! mutate a registry after it has been shared must bring its own
//! synchronization.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use thiserror::Error;
use tracing::{debug, warn};

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The key was already registered.
    #[error("{registry}: duplicate registration for key '{key}'")]
    Duplicate { registry: &'static str, key: String },
}

/// Outcome of a [`Registry::range`] callback that did not succeed.
#[derive(Debug)]
pub enum RangeError<E> {
    /// Skip this entry; the error is collected and returned to the caller.
    Continue(E),
    /// Stop iterating and propagate the error.
    Abort(E),
}

/// Generic keyed store.
pub struct Registry<K, V> {
    name: &'static str,
    entries: HashMap<K, V>,
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + fmt::Debug,
{
    /// Create an empty registry. `name` only shows up in errors and logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: HashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a value, failing if the key already exists.
    pub fn register(&mut self, key: K, value: V) -> Result<(), RegistryError> {
        if self.entries.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                registry: self.name,
                key: format!("{:?}", key),
            });
        }
        debug!(registry = self.name, key = ?key, "Registered entry");
        self.entries.insert(key, value);
        Ok(())
    }

    /// Register a value, panicking on conflict.
    ///
    /// Only meant for startup wiring, where a duplicate is a programming
    /// error and the process must not come up half-configured.
    pub fn must_register(&mut self, key: K, value: V) {
        if let Err(e) = self.register(key, value) {
            panic!("{e}");
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn exists(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Visit every entry in unspecified order.
    ///
    /// Entries whose callback returns [`RangeError::Continue`] are logged and
    /// skipped, and their errors are returned on success. The first
    /// [`RangeError::Abort`] ends the iteration.
    pub fn range<E, F>(&self, mut f: F) -> Result<Vec<E>, E>
    where
        E: fmt::Display,
        F: FnMut(&K, &V) -> Result<(), RangeError<E>>,
    {
        let mut skipped = Vec::new();
        for (key, value) in &self.entries {
            match f(key, value) {
                Ok(()) => {}
                Err(RangeError::Continue(e)) => {
                    warn!(registry = self.name, key = ?key, error = %e, "Skipping entry");
                    skipped.push(e);
                }
                Err(RangeError::Abort(e)) => return Err(e),
            }
        }
        Ok(skipped)
    }
}

impl<K, V> fmt::Debug for Registry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}
