//! Edges and per-edge attributes.

use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A directed, value-equal, hashable edge between two node ports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Source node ID.
    pub from_node: NodeId,
    /// Source output port name.
    pub from_port: String,
    /// Target node ID.
    pub to_node: NodeId,
    /// Target input port name.
    pub to_port: String,
}

impl Edge {
    /// Create a new edge.
    pub fn new(
        from_node: NodeId,
        from_port: impl Into<String>,
        to_node: NodeId,
        to_port: impl Into<String>,
    ) -> Self {
        Self {
            from_node,
            from_port: from_port.into(),
            to_node,
            to_port: to_port.into(),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.from_node, self.from_port, self.to_node, self.to_port
        )
    }
}

/// Compiler-derived attributes for one edge.
///
/// Kept separate from [`Edge`] so the edge itself stays hashable and usable
/// as a token-manager key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeAttrs {
    /// Data-transform policy: type-pair default merged with the
    /// connection-level override, the override winning key-by-key.
    pub transform: BTreeMap<String, Value>,
    /// Whether absence of a token on this edge must not, by itself, block
    /// its target's readiness.
    pub skippable: bool,
    /// Whether the optimizer classified this edge as a loop-back edge.
    pub loop_back: bool,
}
