//! Shared mutable compilation context threaded through the phases.

use super::diagnostics::Diagnostic;
use crate::diagram::{
    CompiledNode, ConcurrencyPolicy, DiagramDescription, Edge, EdgeAttrs, JoinPolicy,
};
use crate::types::{EdgeId, NodeId};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Explicit per-node policy overrides carried from the description until
/// assembly resolves defaults.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PolicyOverrides {
    pub join: Option<JoinPolicy>,
    pub concurrency: Option<ConcurrencyPolicy>,
}

/// A connection with both endpoints resolved to canonical (node, port)
/// pairs.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConnection {
    pub from_node: NodeId,
    pub from_port: String,
    pub to_node: NodeId,
    pub to_port: String,
    pub transform: BTreeMap<String, Value>,
    pub skippable: bool,
}

/// State accumulated across the six phases.
pub(crate) struct Context<'d> {
    pub desc: &'d DiagramDescription,
    pub diagnostics: Vec<Diagnostic>,
    /// Compiled nodes in ID order (transformation).
    pub nodes: Vec<CompiledNode>,
    pub names: HashMap<String, NodeId>,
    pub overrides: HashMap<NodeId, PolicyOverrides>,
    /// Resolved connections (resolution).
    pub resolved: Vec<ResolvedConnection>,
    /// Edges and attributes (edge building, refined by optimization).
    pub edges: Vec<Edge>,
    pub attrs: Vec<EdgeAttrs>,
    /// Index adjacency (optimization).
    pub outgoing: HashMap<NodeId, Vec<EdgeId>>,
    pub incoming: HashMap<NodeId, Vec<EdgeId>>,
    pub ranks: HashMap<NodeId, u32>,
    pub loop_participants: HashSet<NodeId>,
}

impl<'d> Context<'d> {
    pub fn new(desc: &'d DiagramDescription) -> Self {
        Self {
            desc,
            diagnostics: Vec::new(),
            nodes: Vec::new(),
            names: HashMap::new(),
            overrides: HashMap::new(),
            resolved: Vec::new(),
            edges: Vec::new(),
            attrs: Vec::new(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
            ranks: HashMap::new(),
            loop_participants: HashSet::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn node(&self, id: NodeId) -> &CompiledNode {
        &self.nodes[id.as_u32() as usize]
    }

    pub fn node_by_name(&self, name: &str) -> Option<&CompiledNode> {
        self.names.get(name).map(|&id| self.node(id))
    }

    /// Render an edge's endpoints with author-facing names for diagnostics.
    pub fn render_edge(&self, edge: &Edge) -> String {
        format!(
            "{}.{} -> {}.{}",
            self.node(edge.from_node).name,
            edge.from_port,
            self.node(edge.to_node).name,
            edge.to_port,
        )
    }
}
