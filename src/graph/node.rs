//! Graph nodes and edges.

use super::handle::Handle;
use super::id::{EdgeId, NodeId};
use crate::catalog::{FilterDescriptor, OptionValue};
use crate::error::CatalogError;
use crate::types::Track;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Staged media input
    Source,
    Filter,
}

/// Staged media input and the tracks inspection found in it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceNode {
    /// Guest path the media is staged at
    pub staged_path: String,
    pub tracks: Vec<Track>,
}

impl SourceNode {
    pub fn new(staged_path: impl Into<String>) -> Self {
        Self {
            staged_path: staged_path.into(),
            tracks: Vec::new(),
        }
    }

    /// Handles this source exposes, one per track
    pub fn handles(&self) -> Vec<Handle> {
        self.tracks.iter().map(Handle::from).collect()
    }
}

/// A catalog filter plus the option values the user edited.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterInstance {
    pub descriptor: Arc<FilterDescriptor>,
    values: BTreeMap<String, OptionValue>,
}

impl FilterInstance {
    pub fn new(descriptor: Arc<FilterDescriptor>) -> Self {
        Self {
            descriptor,
            values: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Set an option from user input, validated against its schema.
    pub fn set_option(&mut self, key: &str, input: &str) -> Result<(), CatalogError> {
        let schema = self
            .descriptor
            .option(key)
            .ok_or_else(|| CatalogError::UnknownOption {
                filter: self.descriptor.name.clone(),
                option: key.to_string(),
            })?;
        let value = schema
            .parse_value(input)
            .map_err(|message| CatalogError::InvalidValue {
                option: key.to_string(),
                message,
            })?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn clear_option(&mut self, key: &str) -> Option<OptionValue> {
        self.values.remove(key)
    }

    pub fn value(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    /// Values that differ from their schema default, in key order
    pub fn non_default_values(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.values.iter().filter(|(key, value)| {
            self.descriptor
                .option(key)
                .map_or(true, |schema| !schema.is_default(value))
        })
    }

    /// Engine token: `name[:key=value]*`
    pub fn to_token(&self) -> String {
        let mut token = self.descriptor.name.clone();
        for (key, value) in self.non_default_values() {
            token.push(':');
            token.push_str(key);
            token.push('=');
            token.push_str(&value.to_string());
        }
        token
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodePayload {
    Source(SourceNode),
    Filter(FilterInstance),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: NodeId,
    pub payload: NodePayload,
}

impl GraphNode {
    pub fn kind(&self) -> NodeKind {
        match self.payload {
            NodePayload::Source(_) => NodeKind::Source,
            NodePayload::Filter(_) => NodeKind::Filter,
        }
    }

    pub fn as_filter(&self) -> Option<&FilterInstance> {
        match &self.payload {
            NodePayload::Filter(f) => Some(f),
            NodePayload::Source(_) => None,
        }
    }

    pub fn as_source(&self) -> Option<&SourceNode> {
        match &self.payload {
            NodePayload::Source(s) => Some(s),
            NodePayload::Filter(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub source_handle: Handle,
    pub target_handle: Handle,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RawFilterDescriptor;
    use serde_json::json;

    fn scaler() -> Arc<FilterDescriptor> {
        let raw: RawFilterDescriptor = serde_json::from_value(json!({
            "name": "ffsws",
            "options": {
                "osize": { "type": "v2di", "description": "output size" },
                "scale": { "type": "uint", "description": "scaler", "default": "bicubic",
                           "enum": { "bicubic": "", "bilinear": "" } },
                "ofmt": { "type": "str", "description": "pixel format", "default": "none" }
            }
        }))
        .unwrap();
        Arc::new(FilterDescriptor::resolve(raw).unwrap())
    }

    #[test]
    fn test_token_without_options() {
        let filter = FilterInstance::new(scaler());
        assert_eq!(filter.to_token(), "ffsws");
    }

    #[test]
    fn test_token_omits_default_values() {
        let mut filter = FilterInstance::new(scaler());
        filter.set_option("scale", "bicubic").unwrap();
        filter.set_option("osize", "1280x720").unwrap();
        assert_eq!(filter.to_token(), "ffsws:osize=1280x720");

        filter.set_option("scale", "bilinear").unwrap();
        assert_eq!(filter.to_token(), "ffsws:osize=1280x720:scale=bilinear");
    }

    #[test]
    fn test_set_option_validates() {
        let mut filter = FilterInstance::new(scaler());
        assert!(matches!(
            filter.set_option("nope", "1"),
            Err(CatalogError::UnknownOption { .. })
        ));
        assert!(matches!(
            filter.set_option("scale", "lanczos"),
            Err(CatalogError::InvalidValue { .. })
        ));
        assert!(filter.value("scale").is_none());
    }

    #[test]
    fn test_separator_in_value_cannot_split_token() {
        let mut filter = FilterInstance::new(scaler());
        filter.set_option("ofmt", "yuv").unwrap();
        assert!(matches!(
            filter.set_option("ofmt", "a:b"),
            Err(CatalogError::InvalidValue { .. })
        ));
        assert_eq!(filter.to_token(), "ffsws:ofmt=yuv");
    }
}
