//! Named backend registry (spec §4.7, "Registry"). The `cache_backend:
//! name` pipeline option resolves through here at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{CacheBackend, CacheStats};

/// Holds zero or more named `CacheBackend`s. The first backend registered
/// becomes the default, looked up by `default()`/`get(None)`.
pub struct CacheRegistry {
    backends: HashMap<String, Arc<dyn CacheBackend>>,
    default_name: Option<String>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        CacheRegistry { backends: HashMap::new(), default_name: None }
    }

    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn CacheBackend>) {
        let name = name.into();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, backend);
    }

    /// Looks up a backend by name, or the default if `name` is `None`.
    pub fn get(&self, name: Option<&str>) -> Option<Arc<dyn CacheBackend>> {
        match name {
            Some(name) => self.backends.get(name).cloned(),
            None => self.default_name.as_deref().and_then(|name| self.backends.get(name).cloned()),
        }
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn all_stats(&self) -> Vec<(String, CacheStats)> {
        let mut out = Vec::new();
        for name in self.list() {
            if let Some(backend) = self.backends.get(&name) {
                out.push((name, backend.stats().await));
            }
        }
        out
    }

    pub async fn clear_all(&self) -> crate::error::Result<()> {
        for backend in self.backends.values() {
            backend.clear().await?;
        }
        Ok(())
    }

    /// Removes a backend. If it was the default, the next-registered
    /// backend (in insertion order is not tracked, so the first remaining
    /// name alphabetically) becomes the new default.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn CacheBackend>> {
        let removed = self.backends.remove(name);
        if self.default_name.as_deref() == Some(name) {
            self.default_name = self.backends.keys().next().cloned();
        }
        removed
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCacheBackend;

    #[tokio::test]
    async fn first_registered_becomes_default() {
        let mut registry = CacheRegistry::new();
        registry.register("a", Arc::new(InMemoryCacheBackend::new()));
        registry.register("b", Arc::new(InMemoryCacheBackend::new()));
        assert!(registry.get(None).is_some());
        assert_eq!(registry.list(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn unregister_promotes_a_new_default() {
        let mut registry = CacheRegistry::new();
        registry.register("a", Arc::new(InMemoryCacheBackend::new()));
        registry.register("b", Arc::new(InMemoryCacheBackend::new()));
        registry.unregister("a");
        assert!(registry.get(Some("a")).is_none());
        assert!(registry.get(None).is_some());
    }
}
