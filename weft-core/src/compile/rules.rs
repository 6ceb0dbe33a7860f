//! Connection rule set.
//!
//! A pure, stateless predicate table deciding which node-type pairs may be
//! linked. The matches below are exhaustive over [`NodeType`] with no
//! wildcard arms: adding a node type fails compilation until the new type
//! is classified explicitly.

use crate::diagram::NodeType;

/// Whether an edge from `source` to `target` is permitted.
#[must_use]
pub fn can_connect(source: NodeType, target: NodeType) -> bool {
    // Nothing may feed a start node, and an endpoint feeds nothing.
    let target_accepts = match target {
        NodeType::Start => false,
        NodeType::Endpoint
        | NodeType::Task
        | NodeType::Condition
        | NodeType::Loop
        | NodeType::Merge => true,
    };
    let source_emits = match source {
        NodeType::Endpoint => false,
        NodeType::Start
        | NodeType::Task
        | NodeType::Condition
        | NodeType::Loop
        | NodeType::Merge => true,
    };
    source_emits && target_accepts
}

/// Valid peers of one node type, derived from [`can_connect`] over the full
/// type universe. Consumed by external editors and validators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConstraints {
    /// Types that may feed this type.
    pub can_receive_from: Vec<NodeType>,
    /// Types this type may feed.
    pub can_send_to: Vec<NodeType>,
}

/// Compute the connection constraints for a node type.
#[must_use]
pub fn connection_constraints(node_type: NodeType) -> ConnectionConstraints {
    ConnectionConstraints {
        can_receive_from: NodeType::ALL
            .into_iter()
            .filter(|&source| can_connect(source, node_type))
            .collect(),
        can_send_to: NodeType::ALL
            .into_iter()
            .filter(|&target| can_connect(node_type, target))
            .collect(),
    }
}
