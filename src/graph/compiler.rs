use super::id::NodeId;
use super::node::{GraphEdge, GraphNode, NodePayload};
use crate::bridge::ExecutionRequest;
use crate::error::CompileError;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Statistics about a compilation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub source_nodes: usize,
    pub filter_nodes: usize,
    /// Filter → filter edges that constrained the order
    pub ordering_edges: usize,
    pub compile_time_us: u64,
}

/// Linearized graph, ready to run
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPlan {
    /// Engine arguments, without the program name
    pub args: Vec<String>,
    /// Filter nodes in processing order
    pub filter_order: Vec<NodeId>,
    pub output_path: String,
    pub stats: PlanStats,
}

impl CompiledPlan {
    pub fn into_request(self) -> ExecutionRequest {
        ExecutionRequest::process(self.args, self.output_path)
    }
}

/// Compiles a filter graph into the engine's ordered argument list
pub struct GraphCompiler;

impl GraphCompiler {
    /// Compile a graph into engine arguments.
    ///
    /// Emits `-i <path>` for every Source node (in creation order), one
    /// token per Filter node in topological order, then `-o <output>`.
    ///
    /// # Arguments
    /// * `nodes` - All nodes in the graph, in any order
    /// * `edges` - All edges in the graph
    /// * `output_path` - Guest path the engine writes to
    ///
    /// # Errors
    /// `Cycle` when the Filter subgraph is not acyclic, `NoInput` without a
    /// Source node, `DanglingEdge` when an edge names a missing node.
    pub fn compile(
        nodes: &[GraphNode],
        edges: &[GraphEdge],
        output_path: &str,
    ) -> Result<CompiledPlan, CompileError> {
        let start_time = std::time::Instant::now();

        let by_id: HashMap<NodeId, &GraphNode> = nodes.iter().map(|n| (n.id, n)).collect();
        for edge in edges {
            for id in [edge.source, edge.target] {
                if !by_id.contains_key(&id) {
                    return Err(CompileError::DanglingEdge(id));
                }
            }
        }

        let mut sources: Vec<&GraphNode> = nodes
            .iter()
            .filter(|n| matches!(n.payload, NodePayload::Source(_)))
            .collect();
        if sources.is_empty() {
            return Err(CompileError::NoInput);
        }
        sources.sort_by_key(|n| n.id);

        let (order, ordering_edges) = Self::topological_sort_filters(nodes, edges, &by_id)?;

        let mut args = Vec::with_capacity(sources.len() * 2 + order.len() + 2);
        for source in &sources {
            if let Some(src) = source.as_source() {
                args.push("-i".to_string());
                args.push(src.staged_path.clone());
            }
        }
        for id in &order {
            if let Some(filter) = by_id.get(id).and_then(|n| n.as_filter()) {
                args.push(filter.to_token());
            }
        }
        args.push("-o".to_string());
        args.push(output_path.to_string());

        let stats = PlanStats {
            source_nodes: sources.len(),
            filter_nodes: order.len(),
            ordering_edges,
            compile_time_us: start_time.elapsed().as_micros() as u64,
        };

        tracing::debug!(?order, "Compiled graph into {} arguments", args.len());

        Ok(CompiledPlan {
            args,
            filter_order: order,
            output_path: output_path.to_string(),
            stats,
        })
    }

    /// Kahn's algorithm over Filter nodes. Ready nodes are taken smallest id
    /// first, so ties resolve by creation order.
    fn topological_sort_filters(
        nodes: &[GraphNode],
        edges: &[GraphEdge],
        by_id: &HashMap<NodeId, &GraphNode>,
    ) -> Result<(Vec<NodeId>, usize), CompileError> {
        let is_filter = |id: &NodeId| {
            by_id
                .get(id)
                .is_some_and(|n| matches!(n.payload, NodePayload::Filter(_)))
        };

        let mut adj: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut in_degree: HashMap<NodeId, usize> = nodes
            .iter()
            .filter(|n| matches!(n.payload, NodePayload::Filter(_)))
            .map(|n| (n.id, 0))
            .collect();

        let mut ordering_edges = 0;
        for edge in edges {
            if !is_filter(&edge.source) || !is_filter(&edge.target) {
                continue;
            }
            adj.entry(edge.source).or_default().push(edge.target);
            *in_degree.entry(edge.target).or_default() += 1;
            ordering_edges += 1;
        }

        let mut ready: BinaryHeap<Reverse<NodeId>> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| Reverse(id))
            .collect();
        let mut result = Vec::with_capacity(in_degree.len());

        while let Some(Reverse(node)) = ready.pop() {
            result.push(node);

            for neighbor in adj.get(&node).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(neighbor) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(Reverse(*neighbor));
                    }
                }
            }
        }

        if result.len() < in_degree.len() {
            let mut remaining: Vec<NodeId> = in_degree
                .into_iter()
                .filter(|(_, deg)| *deg > 0)
                .map(|(id, _)| id)
                .collect();
            remaining.sort();
            return Err(CompileError::Cycle { nodes: remaining });
        }

        Ok((result, ordering_edges))
    }
}
