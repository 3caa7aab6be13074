//! Filter descriptors: name, capabilities, links and option schemas.

use super::option::{OptionSchema, RawOptionSchema};
use crate::error::CatalogError;
use crate::types::StreamType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Stream types and codec ids on one side of a filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    #[serde(default)]
    pub stream_type: Vec<StreamType>,
    #[serde(default)]
    pub codec_id: Vec<String>,
}

impl CapabilitySet {
    pub fn accepts(&self, stream_type: &StreamType) -> bool {
        self.stream_type.contains(stream_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub input: CapabilitySet,
    #[serde(default)]
    pub output: CapabilitySet,
}

/// Catalog JSON shape of a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFilterDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub sinks: Vec<String>,
    #[serde(default)]
    pub options: BTreeMap<String, RawOptionSchema>,
    /// Everything else the help output carried (`body`, `version`, `author`, ...)
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

/// Immutable description of one processing stage.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDescriptor {
    pub name: String,
    pub description: String,
    pub capabilities: Capabilities,
    /// Filters this one may receive from
    pub sources: BTreeSet<String>,
    /// Filters this one may send to
    pub sinks: BTreeSet<String>,
    pub options: BTreeMap<String, OptionSchema>,
    pub metadata: BTreeMap<String, Value>,
}

impl FilterDescriptor {
    /// Resolve option types, rejecting any the engine vocabulary does not know.
    pub fn resolve(raw: RawFilterDescriptor) -> Result<Self, CatalogError> {
        let mut options = BTreeMap::new();
        for (key, schema) in raw.options {
            let type_name = schema.type_name.clone();
            let resolved =
                OptionSchema::resolve(schema).ok_or_else(|| CatalogError::UnknownOptionType {
                    filter: raw.name.clone(),
                    option: key.clone(),
                    type_name,
                })?;
            options.insert(key, resolved);
        }

        Ok(Self {
            name: raw.name,
            description: raw.description,
            capabilities: raw.capabilities,
            sources: raw.sources.into_iter().collect(),
            sinks: raw.sinks.into_iter().collect(),
            options,
            metadata: raw.metadata,
        })
    }

    pub fn to_raw(&self) -> RawFilterDescriptor {
        RawFilterDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            capabilities: self.capabilities.clone(),
            sources: self.sources.iter().cloned().collect(),
            sinks: self.sinks.iter().cloned().collect(),
            options: self
                .options
                .iter()
                .map(|(k, v)| (k.clone(), v.to_raw()))
                .collect(),
            metadata: self.metadata.clone(),
        }
    }

    pub fn option(&self, key: &str) -> Option<&OptionSchema> {
        self.options.get(key)
    }

    /// Options exposed to the editor
    pub fn editable_options(&self) -> impl Iterator<Item = (&String, &OptionSchema)> {
        self.options.iter().filter(|(_, o)| o.is_user_editable())
    }

    pub fn may_send_to(&self, other: &str) -> bool {
        self.sinks.contains(other)
    }

    pub fn may_receive_from(&self, other: &str) -> bool {
        self.sources.contains(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_rejects_unknown_option_type() {
        let raw: RawFilterDescriptor = serde_json::from_value(json!({
            "name": "resample",
            "options": { "sr": { "type": "hertz", "description": "rate" } }
        }))
        .unwrap();

        let err = FilterDescriptor::resolve(raw).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::UnknownOptionType { ref filter, ref option, ref type_name }
                if filter == "resample" && option == "sr" && type_name == "hertz"
        ));
    }

    #[test]
    fn test_metadata_is_preserved() {
        let raw: RawFilterDescriptor = serde_json::from_value(json!({
            "name": "ffdec",
            "description": "FFMPEG decoder",
            "version": "1.0",
            "body": "Decodes things\n"
        }))
        .unwrap();

        let desc = FilterDescriptor::resolve(raw.clone()).unwrap();
        assert_eq!(desc.metadata.get("version"), Some(&json!("1.0")));
        assert_eq!(desc.to_raw(), raw);
    }

    #[test]
    fn test_links_and_capabilities() {
        let raw: RawFilterDescriptor = serde_json::from_value(json!({
            "name": "rfnalu",
            "capabilities": { "input": { "stream_type": ["Visual"] } },
            "sources": ["fin"],
            "sinks": ["ffdec", "reframer"]
        }))
        .unwrap();

        let desc = FilterDescriptor::resolve(raw).unwrap();
        assert!(desc.capabilities.input.accepts(&StreamType::Visual));
        assert!(!desc.capabilities.input.accepts(&StreamType::Audio));
        assert!(desc.capabilities.output.stream_type.is_empty());
        assert!(desc.may_receive_from("fin"));
        assert!(desc.may_send_to("reframer"));
    }
}
