//! In-memory resource store.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use scaffold_core::{
    application::{ApplicationError, ports::ResourceStore},
    error::ScaffoldResult,
};

/// Thread-safe in-memory resource store, for tests and embedded plans.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResourceStore {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&self, name: impl Into<String>, content: impl Into<String>) {
        if let Ok(mut inner) = self.inner.write() {
            inner.insert(name.into(), content.into());
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceStore for InMemoryResourceStore {
    fn get(&self, name: &str) -> ScaffoldResult<String> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner.get(name).cloned().ok_or_else(|| {
            ApplicationError::ResourceNotFound {
                name: name.to_string(),
            }
            .into()
        })
    }

    fn contains(&self, name: &str) -> bool {
        self.inner
            .read()
            .map(|i| i.contains_key(name))
            .unwrap_or(false)
    }

    fn list(&self) -> ScaffoldResult<Vec<String>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner.keys().cloned().collect())
    }
}
