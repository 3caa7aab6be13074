//! Test data builders for catalogs and graphs

use filterflow_rs::catalog::{FilterCatalog, FilterDescriptor};
use filterflow_rs::graph::{FilterGraph, Handle, NodeId};
use filterflow_rs::types::{StreamType, Track};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builder for one catalog entry
pub struct FilterBuilder {
    name: String,
    inputs: Vec<&'static str>,
    sources: Vec<String>,
    sinks: Vec<String>,
    options: BTreeMap<String, Value>,
}

impl FilterBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inputs: vec!["Visual"],
            sources: Vec::new(),
            sinks: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    pub fn inputs(mut self, inputs: &[&'static str]) -> Self {
        self.inputs = inputs.to_vec();
        self
    }

    pub fn sources(mut self, sources: &[&str]) -> Self {
        self.sources = sources.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn sinks(mut self, sinks: &[&str]) -> Self {
        self.sinks = sinks.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn option(mut self, key: &str, type_name: &str, default: Value) -> Self {
        self.options
            .insert(key.to_string(), json!({ "type": type_name, "default": default }));
        self
    }

    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "description": format!("{} filter", self.name),
            "sources": self.sources,
            "sinks": self.sinks,
            "capabilities": { "input": { "stream_type": self.inputs } },
            "options": self.options,
        })
    }
}

/// Build a catalog from filter builders
pub fn catalog(filters: Vec<FilterBuilder>) -> FilterCatalog {
    let entries: Vec<Value> = filters.iter().map(FilterBuilder::to_json).collect();
    FilterCatalog::from_json(&Value::Array(entries).to_string()).unwrap()
}

/// `a -> b -> c` with back links to `a`, all accepting Visual
pub fn chain_catalog() -> FilterCatalog {
    catalog(vec![
        FilterBuilder::new("a").sources(&["b", "c"]).sinks(&["b"]).option("q", "uint", json!(0)),
        FilterBuilder::new("b").sources(&["a"]).sinks(&["c", "a"]),
        FilterBuilder::new("c").sources(&["b"]).sinks(&["a"]),
    ])
}

pub fn descriptor(catalog: &FilterCatalog, name: &str) -> Arc<FilterDescriptor> {
    catalog.get(name).unwrap().clone()
}

pub fn track(pid: u32, name: &str, stream_type: StreamType) -> Track {
    Track {
        pid,
        stream_type,
        name: name.to_string(),
        attributes: BTreeMap::new(),
    }
}

/// Add a media input carrying `tracks`
pub fn source_with_tracks(graph: &mut FilterGraph, path: &str, tracks: Vec<Track>) -> NodeId {
    let id = graph.add_source(path);
    graph.set_tracks(id, tracks).unwrap();
    id
}

pub fn visual() -> Handle {
    Handle::stream(StreamType::Visual)
}
