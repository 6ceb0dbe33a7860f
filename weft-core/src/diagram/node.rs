//! Node types and compiled node entities.

use super::policy::{ConcurrencyPolicy, JoinPolicy};
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Default execution budget for nodes without a declared maximum.
///
/// Bounds loop participation so runs terminate even absent an explicit
/// exit condition.
pub const DEFAULT_MAX_EXECUTIONS: u32 = 64;

/// The closed set of node type tags.
///
/// The connection rule set and the transform table are total over this
/// enum; adding a variant forces every consumer to classify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Entry point. Exactly one per diagram, runs once at epoch 0.
    Start,
    /// Terminal sink. Never feeds another node.
    Endpoint,
    /// General work unit driven by an external handler.
    Task,
    /// Branching node with mutually-exclusive output ports.
    Condition,
    /// Loop head. Receives the loop-back edge that closes a cycle.
    Loop,
    /// Fan-in join over multiple branches.
    Merge,
}

impl NodeType {
    /// Every node type, in declaration order.
    pub const ALL: [NodeType; 6] = [
        NodeType::Start,
        NodeType::Endpoint,
        NodeType::Task,
        NodeType::Condition,
        NodeType::Loop,
        NodeType::Merge,
    ];

    /// Parse a type tag string.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "start" => Some(Self::Start),
            "endpoint" => Some(Self::Endpoint),
            "task" => Some(Self::Task),
            "condition" => Some(Self::Condition),
            "loop" => Some(Self::Loop),
            "merge" => Some(Self::Merge),
            _ => None,
        }
    }

    /// Get the string tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Endpoint => "endpoint",
            Self::Task => "task",
            Self::Condition => "condition",
            Self::Loop => "loop",
            Self::Merge => "merge",
        }
    }

    /// Whether this type selects exactly one of several output ports per
    /// execution.
    #[must_use]
    pub fn is_branching(&self) -> bool {
        matches!(self, Self::Condition)
    }

    /// Whether this type can produce output tokens at all.
    #[must_use]
    pub fn is_output_capable(&self) -> bool {
        !matches!(self, Self::Endpoint)
    }

    /// Default input port names for this type.
    #[must_use]
    pub fn default_inputs(&self) -> Vec<String> {
        match self {
            Self::Start => vec![],
            Self::Endpoint | Self::Task | Self::Condition | Self::Loop => {
                vec!["in".to_string()]
            }
            Self::Merge => vec!["in".to_string()],
        }
    }

    /// Default output port names for this type.
    #[must_use]
    pub fn default_outputs(&self) -> Vec<String> {
        match self {
            Self::Start => vec!["out".to_string()],
            Self::Endpoint => vec![],
            Self::Task => vec!["out".to_string(), "error".to_string()],
            Self::Condition => vec!["true".to_string(), "false".to_string()],
            Self::Loop => vec!["out".to_string()],
            Self::Merge => vec!["out".to_string()],
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A node after compilation. Immutable once the diagram is assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledNode {
    /// Dense compiler-assigned ID.
    pub id: NodeId,
    /// The author-facing name from the description.
    pub name: String,
    /// Type tag.
    pub node_type: NodeType,
    /// Opaque type-specific configuration, post-transformation.
    pub config: Value,
    /// Declared input port names.
    pub inputs: Vec<String>,
    /// Declared output port names.
    pub outputs: Vec<String>,
    /// Join policy, resolved at assembly.
    pub join: JoinPolicy,
    /// Concurrency policy, resolved at assembly.
    pub concurrency: ConcurrencyPolicy,
    /// Maximum total executions across all epochs.
    pub max_executions: u32,
}

impl CompiledNode {
    /// Whether the node declares the named input port.
    #[must_use]
    pub fn has_input(&self, port: &str) -> bool {
        self.inputs.iter().any(|p| p == port)
    }

    /// Whether the node declares the named output port.
    #[must_use]
    pub fn has_output(&self, port: &str) -> bool {
        self.outputs.iter().any(|p| p == port)
    }
}
