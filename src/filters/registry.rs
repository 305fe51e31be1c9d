//! Filter registry for managing available filter types.

use crate::core::filter::{Filter, FilterDescriptor};
use indexmap::IndexMap;
use std::sync::Arc;

/// Factory function for creating filter instances.
pub type FilterFactory = Arc<dyn Fn() -> Box<dyn Filter> + Send + Sync>;

/// Registry entry containing a cached descriptor and factory.
#[derive(Clone)]
pub struct RegistryEntry {
    /// Factory function to create instances.
    pub factory: FilterFactory,
    /// Cached descriptor (avoids creating an instance just to describe it).
    pub descriptor: FilterDescriptor,
    /// Whether this filter is enabled.
    pub enabled: bool,
    /// Tags for organization and search.
    pub tags: Vec<String>,
}

/// Registry for all available filter types.
///
/// The registry maintains a collection of filter factories that can be used
/// to create fresh instances. Every instance starts unconnected and
/// unnegotiated; the caller wires it into a pipeline afterwards.
pub struct FilterRegistry {
    /// Filters indexed by their unique ID.
    filters: IndexMap<String, RegistryEntry>,
}

impl FilterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            filters: IndexMap::new(),
        }
    }

    /// Create a registry pre-populated with built-in filters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::filters::register_builtins(&mut registry);
        registry
    }

    /// Register a filter type.
    pub fn register<F>(&mut self, factory: F)
    where
        F: Fn() -> Box<dyn Filter> + Send + Sync + 'static,
    {
        self.register_with_tags(factory, Vec::new());
    }

    /// Register a filter with additional tags.
    pub fn register_with_tags<F>(&mut self, factory: F, tags: Vec<String>)
    where
        F: Fn() -> Box<dyn Filter> + Send + Sync + 'static,
    {
        // Create a temporary instance to cache the descriptor
        let instance = factory();
        let descriptor = instance.descriptor();
        let id = descriptor.id.clone();

        let entry = RegistryEntry {
            factory: Arc::new(factory),
            descriptor,
            enabled: true,
            tags,
        };

        self.filters.insert(id, entry);
    }

    /// Create a new instance of a filter by ID.
    pub fn create(&self, id: &str) -> Option<Box<dyn Filter>> {
        self.filters
            .get(id)
            .filter(|e| e.enabled)
            .map(|e| (e.factory)())
    }

    /// Get the descriptor for a filter without creating an instance.
    pub fn descriptor(&self, id: &str) -> Option<&FilterDescriptor> {
        self.filters.get(id).map(|e| &e.descriptor)
    }

    /// Get a registry entry.
    pub fn get_entry(&self, id: &str) -> Option<&RegistryEntry> {
        self.filters.get(id)
    }

    /// Check if a filter is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.filters.contains_key(id)
    }

    /// Get all registered filter IDs.
    pub fn filter_ids(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(|s| s.as_str())
    }

    /// Get all registered filters.
    pub fn filters(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.filters.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Search filters by ID, name, description, or tag.
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();

        self.filters
            .iter()
            .filter(|(_, entry)| {
                let name_match = entry.descriptor.name.to_lowercase().contains(&query);
                let desc_match = entry.descriptor.description.to_lowercase().contains(&query);
                let tag_match = entry.tags.iter().any(|t| t.to_lowercase().contains(&query));
                let id_match = entry.descriptor.id.to_lowercase().contains(&query);

                name_match || desc_match || tag_match || id_match
            })
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Enable or disable a filter.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        if let Some(entry) = self.filters.get_mut(id) {
            entry.enabled = enabled;
            true
        } else {
            false
        }
    }

    /// Add tags to a filter.
    pub fn add_tags(&mut self, id: &str, tags: Vec<String>) -> bool {
        if let Some(entry) = self.filters.get_mut(id) {
            entry.tags.extend(tags);
            true
        } else {
            false
        }
    }

    /// Unregister a filter.
    pub fn unregister(&mut self, id: &str) -> bool {
        self.filters.shift_remove(id).is_some()
    }

    /// Get the total number of registered filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Get count of enabled filters.
    pub fn enabled_count(&self) -> usize {
        self.filters.values().filter(|e| e.enabled).count()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
