//! User-edited filter graph.
//!
//! The external editor mutates a [`FilterGraph`]: it adds media inputs and
//! catalog filters, and proposes edges which [`GraphValidator`] gates. On
//! demand, [`GraphCompiler`] linearizes the graph into engine arguments.
//!
//! ```text
//! [Source video.mp4] ──track1/Visual──► [rfnalu] ──Visual──► [ffdec] ──► -o output
//! ```
//!
//! Topologies not yet supported are refused at connect time: several
//! media inputs feeding one filter, and one filter feeding several filters.

pub mod compiler;
pub mod handle;
pub mod id;
pub mod node;
pub mod validator;

pub use compiler::{CompiledPlan, GraphCompiler, PlanStats};
pub use handle::Handle;
pub use id::{EdgeId, NodeId};
pub use node::{
    FilterInstance, GraphEdge, GraphNode, NodeKind, NodePayload, SourceNode,
};
pub use validator::GraphValidator;

use crate::catalog::FilterDescriptor;
use crate::error::{CatalogError, CompileError, ValidationError};
use crate::types::Track;
use std::sync::Arc;

/// Container of nodes and validated edges.
#[derive(Debug, Clone, Default)]
pub struct FilterGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    next_node: u32,
    next_edge: u32,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_node(&mut self, payload: NodePayload) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.push(GraphNode { id, payload });
        id
    }

    /// Add a media input staged at `staged_path`
    pub fn add_source(&mut self, staged_path: impl Into<String>) -> NodeId {
        self.alloc_node(NodePayload::Source(SourceNode::new(staged_path)))
    }

    pub fn add_filter(&mut self, descriptor: Arc<FilterDescriptor>) -> NodeId {
        self.alloc_node(NodePayload::Filter(FilterInstance::new(descriptor)))
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, id: NodeId) -> Option<GraphNode> {
        let pos = self.nodes.iter().position(|n| n.id == id)?;
        self.edges.retain(|e| e.source != id && e.target != id);
        Some(self.nodes.remove(pos))
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Attach inspection results to a media input; its handles follow the tracks.
    pub fn set_tracks(&mut self, id: NodeId, tracks: Vec<Track>) -> Result<(), ValidationError> {
        match self.node_mut(id).map(|n| &mut n.payload) {
            Some(NodePayload::Source(source)) => {
                source.tracks = tracks;
                Ok(())
            }
            Some(NodePayload::Filter(_)) => Err(ValidationError::Incompatible(format!(
                "{} is not a media input",
                id
            ))),
            None => Err(ValidationError::UnknownNode(id)),
        }
    }

    /// Set a filter option from user input
    pub fn set_option(&mut self, id: NodeId, key: &str, value: &str) -> Result<(), CatalogError> {
        match self.node_mut(id).map(|n| &mut n.payload) {
            Some(NodePayload::Filter(filter)) => filter.set_option(key, value),
            _ => Err(CatalogError::UnknownOption {
                filter: id.to_string(),
                option: key.to_string(),
            }),
        }
    }

    /// Propose an edge. It is created only if every check passes.
    pub fn connect(
        &mut self,
        source: NodeId,
        target: NodeId,
        source_handle: Handle,
        target_handle: Handle,
    ) -> Result<EdgeId, ValidationError> {
        if source == target {
            return Err(ValidationError::SelfLoop(source));
        }
        let from = self
            .node(source)
            .ok_or(ValidationError::UnknownNode(source))?;
        let to = self
            .node(target)
            .ok_or(ValidationError::UnknownNode(target))?;

        let duplicate = self.edges.iter().any(|e| {
            e.source == source
                && e.target == target
                && e.source_handle == source_handle
                && e.target_handle == target_handle
        });
        if duplicate {
            return Err(ValidationError::DuplicateEdge);
        }

        GraphValidator::check(from, to, &source_handle, &target_handle)?;
        self.check_supported_topology(from, target)?;

        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.edges.push(GraphEdge {
            id,
            source,
            target,
            source_handle,
            target_handle,
        });
        tracing::debug!("Connected {} -> {} as {:?}", source, target, id);
        Ok(id)
    }

    fn check_supported_topology(
        &self,
        from: &GraphNode,
        target: NodeId,
    ) -> Result<(), ValidationError> {
        match from.kind() {
            NodeKind::Source => {
                let other_input = self.edges.iter().any(|e| {
                    e.target == target
                        && e.source != from.id
                        && self.node(e.source).map(GraphNode::kind) == Some(NodeKind::Source)
                });
                if other_input {
                    return Err(ValidationError::Unsupported(format!(
                        "{} already receives from another media input",
                        target
                    )));
                }
            }
            NodeKind::Filter => {
                let fans_out = self
                    .edges
                    .iter()
                    .any(|e| e.source == from.id && e.target != target);
                if fans_out {
                    return Err(ValidationError::Unsupported(format!(
                        "{} already feeds another filter",
                        from.id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn disconnect(&mut self, id: EdgeId) -> Option<GraphEdge> {
        let pos = self.edges.iter().position(|e| e.id == id)?;
        Some(self.edges.remove(pos))
    }

    pub fn compile(&self, output_path: &str) -> Result<CompiledPlan, CompileError> {
        GraphCompiler::compile(&self.nodes, &self.edges, output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FilterCatalog;
    use crate::types::StreamType;
    use std::collections::BTreeMap;

    fn catalog() -> FilterCatalog {
        FilterCatalog::from_json(
            r#"[
            { "name": "rfnalu", "sources": ["ffsws"], "sinks": ["ffdec", "ffsws"],
              "capabilities": { "input": { "stream_type": ["Visual"] } } },
            { "name": "ffdec", "sources": ["rfnalu"], "sinks": ["ffsws"],
              "capabilities": { "input": { "stream_type": ["Visual", "Audio"] } } },
            { "name": "ffsws", "sources": ["ffdec", "rfnalu"], "sinks": ["rfnalu"],
              "capabilities": { "input": { "stream_type": ["Visual"] } } }
        ]"#,
        )
        .unwrap()
    }

    fn track(pid: u32, name: &str, st: StreamType) -> Track {
        Track {
            pid,
            stream_type: st,
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_connect_and_compile() {
        let catalog = catalog();
        let mut graph = FilterGraph::new();
        let src = graph.add_source("/root/video.mp4");
        let dec = graph.add_filter(catalog.get("ffdec").unwrap().clone());
        let nalu = graph.add_filter(catalog.get("rfnalu").unwrap().clone());

        graph
            .set_tracks(src, vec![track(1, "video", StreamType::Visual)])
            .unwrap();
        let handle = graph.node(src).unwrap().as_source().unwrap().handles()[0].clone();
        graph
            .connect(src, nalu, handle, Handle::stream(StreamType::Visual))
            .unwrap();
        let visual = Handle::stream(StreamType::Visual);
        graph.connect(nalu, dec, visual.clone(), visual).unwrap();

        let plan = graph.compile("/root/output.mp4").unwrap();
        assert_eq!(
            plan.args,
            vec!["-i", "/root/video.mp4", "rfnalu", "ffdec", "-o", "/root/output.mp4"]
        );
    }

    #[test]
    fn test_rejected_edge_is_not_created() {
        let catalog = catalog();
        let mut graph = FilterGraph::new();
        let dec = graph.add_filter(catalog.get("ffdec").unwrap().clone());
        let nalu = graph.add_filter(catalog.get("rfnalu").unwrap().clone());

        let err = graph
            .connect(
                nalu,
                dec,
                Handle::stream(StreamType::Visual),
                Handle::stream(StreamType::Audio),
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::Incompatible(_)));
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_structural_rejections() {
        let catalog = catalog();
        let mut graph = FilterGraph::new();
        let nalu = graph.add_filter(catalog.get("rfnalu").unwrap().clone());
        let v = Handle::stream(StreamType::Visual);

        assert_eq!(
            graph.connect(nalu, nalu, v.clone(), v.clone()),
            Err(ValidationError::SelfLoop(nalu))
        );
        assert_eq!(
            graph.connect(nalu, NodeId(42), v.clone(), v.clone()),
            Err(ValidationError::UnknownNode(NodeId(42)))
        );

        let dec = graph.add_filter(catalog.get("ffdec").unwrap().clone());
        graph.connect(nalu, dec, v.clone(), v.clone()).unwrap();
        assert_eq!(
            graph.connect(nalu, dec, v.clone(), v.clone()),
            Err(ValidationError::DuplicateEdge)
        );
    }

    #[test]
    fn test_fan_out_and_multi_input_unsupported() {
        let catalog = catalog();
        let mut graph = FilterGraph::new();
        let v = Handle::stream(StreamType::Visual);

        let nalu = graph.add_filter(catalog.get("rfnalu").unwrap().clone());
        let dec = graph.add_filter(catalog.get("ffdec").unwrap().clone());
        let sws = graph.add_filter(catalog.get("ffsws").unwrap().clone());
        graph.connect(nalu, dec, v.clone(), v.clone()).unwrap();
        assert!(matches!(
            graph.connect(nalu, sws, v.clone(), v.clone()),
            Err(ValidationError::Unsupported(_))
        ));

        let a = graph.add_source("/root/a.mp4");
        let b = graph.add_source("/root/b.mp4");
        let th: Handle = "t/Visual".parse().unwrap();
        graph.connect(a, sws, th.clone(), v.clone()).unwrap();
        assert!(matches!(
            graph.connect(b, sws, th, v),
            Err(ValidationError::Unsupported(_))
        ));
    }

    #[test]
    fn test_remove_node_drops_edges() {
        let catalog = catalog();
        let mut graph = FilterGraph::new();
        let v = Handle::stream(StreamType::Visual);
        let nalu = graph.add_filter(catalog.get("rfnalu").unwrap().clone());
        let dec = graph.add_filter(catalog.get("ffdec").unwrap().clone());
        graph.connect(nalu, dec, v.clone(), v).unwrap();

        assert!(graph.remove_node(dec).is_some());
        assert!(graph.edges().is_empty());
        assert!(graph.node(dec).is_none());
    }

    #[test]
    fn test_cycle_surfaces_at_compile() {
        let catalog = catalog();
        let mut graph = FilterGraph::new();
        let v = Handle::stream(StreamType::Visual);
        graph.add_source("/root/video.mp4");
        let nalu = graph.add_filter(catalog.get("rfnalu").unwrap().clone());
        let dec = graph.add_filter(catalog.get("ffdec").unwrap().clone());
        let sws = graph.add_filter(catalog.get("ffsws").unwrap().clone());
        graph.connect(nalu, dec, v.clone(), v.clone()).unwrap();
        graph.connect(dec, sws, v.clone(), v.clone()).unwrap();
        graph.connect(sws, nalu, v.clone(), v).unwrap();

        assert!(matches!(
            graph.compile("/root/o.mp4"),
            Err(CompileError::Cycle { .. })
        ));
    }

    #[test]
    fn test_track_edge_with_mismatched_target_not_created() {
        let catalog = catalog();
        let mut graph = FilterGraph::new();
        let src = graph.add_source("/root/video.mp4");
        graph
            .set_tracks(src, vec![track(1, "video", StreamType::Visual)])
            .unwrap();
        let dec = graph.add_filter(catalog.get("ffdec").unwrap().clone());

        let video: Handle = "video/Visual".parse().unwrap();
        assert!(matches!(
            graph.connect(src, dec, video.clone(), Handle::stream(StreamType::Audio)),
            Err(ValidationError::Incompatible(_))
        ));
        assert!(matches!(
            graph.connect(src, dec, "ghost/Visual".parse().unwrap(), Handle::stream(StreamType::Visual)),
            Err(ValidationError::Incompatible(_))
        ));
        assert!(graph.edges().is_empty());

        graph
            .connect(src, dec, video, Handle::stream(StreamType::Visual))
            .unwrap();
        assert_eq!(graph.edges().len(), 1);
    }
}
