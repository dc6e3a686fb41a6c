//! Filter catalog: the filter types this library can instantiate.

use crate::core::error::{FilterError, FilterResult};
use crate::core::kernel::{FilterMetadata, Kernel};
use crate::filters::kind::{Category, FilterType};
use indexmap::IndexMap;
use std::sync::{Arc, OnceLock};

/// Factory function for creating kernel instances.
pub type KernelFactory = Arc<dyn Fn() -> Box<dyn Kernel> + Send + Sync>;

/// Catalog entry containing metadata and factory.
#[derive(Clone)]
pub struct CatalogEntry {
    /// Factory function to create instances.
    pub factory: KernelFactory,
    /// Cached metadata, including the parameter schema.
    pub metadata: FilterMetadata,
}

/// Catalog of all filter types with a host kernel.
///
/// The catalog supplies each filter's parameter schema at creation and the
/// kernel that runs it. Types absent from the catalog are reported as
/// unimplemented, machine-learning types as unsupported.
pub struct FilterCatalog {
    /// Entries indexed by filter type, in registration order.
    entries: IndexMap<FilterType, CatalogEntry>,
}

static SHARED: OnceLock<Arc<FilterCatalog>> = OnceLock::new();

impl FilterCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Create a catalog pre-populated with built-in kernels.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        crate::filters::builtin::register_all(&mut catalog);
        catalog
    }

    /// Process-wide catalog of built-in kernels.
    pub fn shared() -> Arc<FilterCatalog> {
        SHARED
            .get_or_init(|| Arc::new(FilterCatalog::with_builtins()))
            .clone()
    }

    /// Register a kernel; a later registration for the same type replaces it.
    pub fn register<F>(&mut self, factory: F)
    where
        F: Fn() -> Box<dyn Kernel> + Send + Sync + 'static,
    {
        let metadata = factory().metadata();
        let entry = CatalogEntry {
            factory: Arc::new(factory),
            metadata,
        };
        self.entries.insert(entry.metadata.filter_type, entry);
    }

    /// Look up the entry for a filter type.
    pub fn entry(&self, filter_type: FilterType) -> FilterResult<&CatalogEntry> {
        if let Some(entry) = self.entries.get(&filter_type) {
            return Ok(entry);
        }
        if filter_type.is_machine_learning() {
            Err(FilterError::Unsupported(format!(
                "{} requires model inference, which no device provides",
                filter_type
            )))
        } else {
            Err(FilterError::Unimplemented(format!(
                "no kernel for filter type {} ({:#x})",
                filter_type,
                filter_type.code()
            )))
        }
    }

    /// Create a new kernel instance.
    pub fn create(&self, filter_type: FilterType) -> FilterResult<Box<dyn Kernel>> {
        self.entry(filter_type).map(|e| (e.factory)())
    }

    /// Get metadata for a filter type without creating a kernel.
    pub fn get_metadata(&self, filter_type: FilterType) -> Option<&FilterMetadata> {
        self.entries.get(&filter_type).map(|e| &e.metadata)
    }

    /// Check if a filter type is catalogued.
    pub fn contains(&self, filter_type: FilterType) -> bool {
        self.entries.contains_key(&filter_type)
    }

    /// All catalogued filter types.
    pub fn filter_types(&self) -> impl Iterator<Item = FilterType> + '_ {
        self.entries.keys().copied()
    }

    /// Get catalogued types in a category.
    pub fn filters_by_category(&self, category: Category) -> Vec<FilterType> {
        self.filter_types()
            .filter(|t| t.category() == category)
            .collect()
    }

    /// Search by identifier, name, description or tag.
    pub fn search(&self, query: &str) -> Vec<FilterType> {
        let query = query.to_lowercase();
        self.entries
            .iter()
            .filter(|(ty, entry)| {
                let m = &entry.metadata;
                ty.id().contains(&query)
                    || m.name.to_lowercase().contains(&query)
                    || m.description.to_lowercase().contains(&query)
                    || m.tags.iter().any(|t| t.to_lowercase().contains(&query))
            })
            .map(|(ty, _)| *ty)
            .collect()
    }

    /// Get metadata grouped by category, each group sorted by name.
    pub fn grouped_by_category(&self) -> IndexMap<Category, Vec<&FilterMetadata>> {
        let mut grouped: IndexMap<Category, Vec<&FilterMetadata>> = IndexMap::new();
        for category in Category::all() {
            let mut group: Vec<&FilterMetadata> = self
                .entries
                .values()
                .map(|e| &e.metadata)
                .filter(|m| m.category() == *category)
                .collect();
            if !group.is_empty() {
                group.sort_by(|a, b| a.name.cmp(&b.name));
                grouped.insert(*category, group);
            }
        }
        grouped
    }

    /// Get the number of catalogued types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FilterCatalog {
    fn default() -> Self {
        Self::with_builtins()
    }
}
