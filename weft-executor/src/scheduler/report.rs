//! Run outcome summary.

use super::state::NodeState;
use crate::snapshot::RunSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use weft_core::types::{NodeId, RunId};

/// Terminal counters for one node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeReport {
    /// Terminal state.
    pub state: NodeState,
    /// Executions across all epochs.
    pub exec_count: u32,
}

/// Summary returned when a run finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// The finished run.
    pub run_id: RunId,
    /// The diagram that was executed.
    pub diagram: String,
    /// Per-node terminal state and execution counts.
    pub nodes: HashMap<NodeId, NodeReport>,
    /// Non-fatal findings collected while driving (routed failures,
    /// dropped outputs).
    pub diagnostics: Vec<String>,
    /// Epochs used, inclusive of epoch 0.
    pub epochs_used: u32,
    /// Final state capture, feedable to [`Scheduler::resume`].
    ///
    /// [`Scheduler::resume`]: super::Scheduler::resume
    pub checkpoint: RunSnapshot,
}

impl RunReport {
    /// Terminal state of a node.
    #[must_use]
    pub fn state_of(&self, node: NodeId) -> Option<NodeState> {
        self.nodes.get(&node).map(|r| r.state)
    }

    /// Execution count of a node.
    #[must_use]
    pub fn executions_of(&self, node: NodeId) -> u32 {
        self.nodes.get(&node).map_or(0, |r| r.exec_count)
    }

    /// Whether every node finished without failure.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.nodes.values().all(|r| r.state != NodeState::Failed)
    }
}
