//! The compiler's immutable output.

use super::edge::{Edge, EdgeAttrs};
use super::node::CompiledNode;
use crate::compile::Diagnostic;
use crate::types::{EdgeId, NodeId};
use std::collections::{HashMap, HashSet};

/// A fully resolved, analyzable execution plan.
///
/// Built once per compilation and immutable for the lifetime of a run.
/// Adjacency is index-based: edges live in one vector and the forward and
/// reverse maps hold [`EdgeId`]s into it.
#[derive(Debug)]
pub struct ExecutableDiagram {
    pub(crate) name: String,
    pub(crate) nodes: HashMap<NodeId, CompiledNode>,
    pub(crate) names: HashMap<String, NodeId>,
    /// Node IDs in assignment order (deterministic iteration).
    pub(crate) order: Vec<NodeId>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) attrs: Vec<EdgeAttrs>,
    pub(crate) outgoing: HashMap<NodeId, Vec<EdgeId>>,
    pub(crate) incoming: HashMap<NodeId, Vec<EdgeId>>,
    pub(crate) ranks: HashMap<NodeId, u32>,
    pub(crate) loop_participants: HashSet<NodeId>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl ExecutableDiagram {
    /// The diagram name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a node by ID.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&CompiledNode> {
        self.nodes.get(&id)
    }

    /// Get a node by its author-facing name.
    #[must_use]
    pub fn node_by_name(&self, name: &str) -> Option<&CompiledNode> {
        self.names.get(name).and_then(|id| self.nodes.get(id))
    }

    /// Iterate nodes in ID-assignment order.
    pub fn nodes(&self) -> impl Iterator<Item = &CompiledNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Node IDs in assignment order.
    #[must_use]
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    /// The single start node. Validation guarantees one exists, so this
    /// only returns `None` for a hand-built diagram.
    #[must_use]
    pub fn start_node(&self) -> Option<&CompiledNode> {
        self.nodes().find(|n| n.node_type == super::NodeType::Start)
    }

    /// All endpoint nodes.
    pub fn endpoints(&self) -> impl Iterator<Item = &CompiledNode> {
        self.nodes()
            .filter(|n| n.node_type == super::NodeType::Endpoint)
    }

    /// Get an edge by ID.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.index())
    }

    /// Get the attributes of an edge.
    #[must_use]
    pub fn edge_attrs(&self, id: EdgeId) -> Option<&EdgeAttrs> {
        self.attrs.get(id.index())
    }

    /// Whether an edge was classified loop-back.
    #[must_use]
    pub fn is_loop_back(&self, id: EdgeId) -> bool {
        self.attrs.get(id.index()).is_some_and(|a| a.loop_back)
    }

    /// Outgoing edges of a node, grouped by nothing, in build order.
    pub fn outgoing_edges(&self, node: NodeId) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.outgoing
            .get(&node)
            .into_iter()
            .flat_map(move |ids| ids.iter().map(|&id| (id, &self.edges[id.index()])))
    }

    /// Incoming edges of a node, in build order.
    pub fn incoming_edges(&self, node: NodeId) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.incoming
            .get(&node)
            .into_iter()
            .flat_map(move |ids| ids.iter().map(|&id| (id, &self.edges[id.index()])))
    }

    /// Topological rank of a node over the base DAG (loop-back edges
    /// excluded).
    #[must_use]
    pub fn rank(&self, node: NodeId) -> Option<u32> {
        self.ranks.get(&node).copied()
    }

    /// Nodes participating in at least one loop.
    #[must_use]
    pub fn loop_participants(&self) -> &HashSet<NodeId> {
        &self.loop_participants
    }

    /// Compilation diagnostics (warnings only; errors block assembly).
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
