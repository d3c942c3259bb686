//! Provider registry for runtime adapter lookup.

use std::collections::HashMap;

use super::box_provider::BoxProviderAdapter;

/// Adapters indexed by lower-cased provider id.
///
/// Built once at startup from an explicit list; there is no removal.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<String, BoxProviderAdapter>,
}

impl ProviderRegistry {
    pub fn new(adapters: Vec<BoxProviderAdapter>) -> Self {
        let mut registry = Self::default();
        for adapter in adapters {
            registry.register(adapter);
        }
        registry
    }

    /// Register an adapter under its id, replacing any previous one.
    pub fn register(&mut self, adapter: BoxProviderAdapter) {
        let id = adapter.id().as_str().to_lowercase();
        if self.adapters.insert(id.clone(), adapter).is_some() {
            tracing::debug!(provider = %id, "replaced registered adapter");
        }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, id: &str) -> Option<&BoxProviderAdapter> {
        self.adapters.get(&id.trim().to_lowercase())
    }

    /// Registered ids, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
