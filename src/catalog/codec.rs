//! Codec catalog.
//!
//! Built from `-h codecs`. Entries are informational: the graph never
//! validates against them, but editors show them next to `CodecID`
//! capabilities.

use crate::error::{CatalogError, FilterFlowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Flags from the `IODE` letters after a codec name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecCapabilities {
    pub raw_input: bool,
    pub raw_output: bool,
    pub decoder: bool,
    pub encoder: bool,
}

impl CodecCapabilities {
    /// Unknown letters are ignored
    pub fn from_letters(letters: &str) -> Self {
        let mut caps = Self::default();
        for c in letters.chars() {
            match c {
                'I' => caps.raw_input = true,
                'O' => caps.raw_output = true,
                'D' => caps.decoder = true,
                'E' => caps.encoder = true,
                _ => {}
            }
        }
        caps
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecDescriptor {
    pub name: String,
    pub description: String,
    pub mime: String,
    /// Primary name when this entry is an alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_of: Option<String>,
    #[serde(default)]
    pub capabilities: CodecCapabilities,
}

/// Codec descriptors indexed by name, in listing order.
#[derive(Debug, Clone, Default)]
pub struct CodecCatalog {
    codecs: Vec<CodecDescriptor>,
    by_name: HashMap<String, usize>,
}

impl CodecCatalog {
    /// A later entry with an existing name replaces it in place.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = CodecDescriptor>) -> Self {
        let mut catalog = Self::default();
        for desc in descriptors {
            match catalog.by_name.get(&desc.name) {
                Some(&i) => catalog.codecs[i] = desc,
                None => {
                    catalog.by_name.insert(desc.name.clone(), catalog.codecs.len());
                    catalog.codecs.push(desc);
                }
            }
        }
        catalog
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, CatalogError> {
        let codecs: Vec<CodecDescriptor> = serde_json::from_str(json)?;
        Ok(Self::from_descriptors(codecs))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FilterFlowError::Io(e).with_context(format!("Failed to read {}", path.display()))
        })?;
        let catalog = Self::from_json(&content)?;
        tracing::info!("Loaded {} codecs from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, CatalogError> {
        Ok(serde_json::to_string_pretty(&self.codecs)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CodecDescriptor> {
        self.by_name.get(name).map(|&i| &self.codecs[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodecDescriptor> {
        self.codecs.iter()
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}
