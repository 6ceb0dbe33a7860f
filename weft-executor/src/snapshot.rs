//! Serializable run checkpoints.
//!
//! The engine never persists anything itself; snapshots exist so an
//! external collaborator can checkpoint a run and hand the state back
//! later. Tuple-keyed maps are flattened into entry lists because JSON
//! objects cannot key on tuples.

use crate::scheduler::NodeState;
use crate::tokens::Token;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use weft_core::types::{EdgeId, Epoch, NodeId, RunId};

/// A full copy of a token manager's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSnapshot {
    /// The current epoch.
    pub epoch: Epoch,
    /// `(edge, epoch, highest sequence)` entries.
    pub seq: Vec<(EdgeId, Epoch, u64)>,
    /// All published tokens, identity included.
    pub tokens: Vec<Token>,
    /// `(consumer, edge, epoch, cursor)` entries.
    pub cursors: Vec<(NodeId, EdgeId, Epoch, u64)>,
    /// `(node, epoch, fired port)` branch decisions.
    pub branches: Vec<(NodeId, Epoch, String)>,
}

/// Per-node scheduler counters at checkpoint time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCheckpoint {
    /// Terminal or in-progress state.
    pub state: NodeState,
    /// Completed executions across all epochs.
    pub exec_count: u32,
}

/// A full copy of one run's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// The run this snapshot belongs to.
    pub run_id: RunId,
    /// The diagram name, for sanity checks on restore.
    pub diagram: String,
    /// Scheduler counters per node.
    pub nodes: HashMap<NodeId, NodeCheckpoint>,
    /// The token manager's state.
    pub tokens: TokenSnapshot,
}
