//! Filter catalog.
//!
//! A read-only collection of [`FilterDescriptor`]s, loaded from the JSON
//! layout produced by the catalog generator (see [`builder`]). Option types
//! are resolved at load, so a catalog that loads is fully typed. The
//! engine's codec list is kept separately in a [`CodecCatalog`].
//!
//! ```ignore
//! let catalog = FilterCatalog::load("filters.json")?;
//! let reframer = catalog.get("reframer").expect("known filter");
//! ```

pub mod builder;
pub mod codec;
pub mod descriptor;
pub mod help;
pub mod option;

pub use builder::CatalogBuilder;
pub use codec::{CodecCapabilities, CodecCatalog, CodecDescriptor};
pub use descriptor::{Capabilities, CapabilitySet, FilterDescriptor, RawFilterDescriptor};
pub use option::{OptionKind, OptionSchema, OptionValue, RawOptionSchema};

use crate::error::{CatalogError, FilterFlowError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Immutable set of filter descriptors indexed by name.
#[derive(Debug, Clone, Default)]
pub struct FilterCatalog {
    filters: Vec<Arc<FilterDescriptor>>,
    by_name: HashMap<String, usize>,
}

impl FilterCatalog {
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = FilterDescriptor>,
    ) -> std::result::Result<Self, CatalogError> {
        let mut catalog = Self::default();
        for desc in descriptors {
            if catalog.by_name.contains_key(&desc.name) {
                return Err(CatalogError::DuplicateFilter(desc.name));
            }
            catalog
                .by_name
                .insert(desc.name.clone(), catalog.filters.len());
            catalog.filters.push(Arc::new(desc));
        }
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, CatalogError> {
        let raw: Vec<RawFilterDescriptor> = serde_json::from_str(json)?;
        let descriptors = raw
            .into_iter()
            .map(FilterDescriptor::resolve)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::from_descriptors(descriptors)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FilterFlowError::Io(e).with_context(format!("Failed to read {}", path.display()))
        })?;
        let catalog = Self::from_json(&content)?;
        tracing::info!("Loaded {} filters from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, CatalogError> {
        let raw: Vec<RawFilterDescriptor> = self.filters.iter().map(|f| f.to_raw()).collect();
        Ok(serde_json::to_string_pretty(&raw)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FilterDescriptor>> {
        self.by_name.get(name).map(|&i| &self.filters[i])
    }

    /// Filters in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<FilterDescriptor>> {
        self.filters.iter()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
