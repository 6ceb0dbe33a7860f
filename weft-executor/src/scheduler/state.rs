//! Per-run scheduler state.
//!
//! One mutex guards all per-node counters, making admission (admit-check
//! plus in-flight increment) a single atomic step. The drive loop is the
//! only writer; handler tasks never touch this state directly.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use weft_core::diagram::ExecutableDiagram;
use weft_core::error::{Result, WeftError};
use weft_core::types::NodeId;

/// Lifecycle state of one node within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Not yet eligible to run.
    Pending,
    /// Inputs satisfied, awaiting admission.
    Ready,
    /// At least one execution in flight.
    Running,
    /// Ran at least once and the run ended without failure.
    Completed,
    /// A handler failure with no error route, a timeout, or a panic.
    Failed,
    /// Never ran; its branch lost or its inputs never arrived.
    Skipped,
}

impl NodeState {
    /// Whether the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

/// Counters for one node.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeRuntime {
    pub state: NodeState,
    /// Completed or started executions across all epochs.
    pub exec_count: u32,
    /// Currently spawned executions.
    pub in_flight: u32,
}

impl Default for NodeRuntime {
    fn default() -> Self {
        Self {
            state: NodeState::Pending,
            exec_count: 0,
            in_flight: 0,
        }
    }
}

/// All per-node counters for one run.
pub(crate) struct RunState {
    nodes: Mutex<HashMap<NodeId, NodeRuntime>>,
}

impl RunState {
    pub fn new(diagram: &ExecutableDiagram) -> Self {
        let nodes = diagram
            .node_ids()
            .iter()
            .map(|&id| (id, NodeRuntime::default()))
            .collect();
        Self {
            nodes: Mutex::new(nodes),
        }
    }

    /// Admit one execution if the concurrency policy allows it.
    ///
    /// The check and the in-flight increment happen under one lock
    /// acquisition. The execution budget is charged at admission, so a
    /// hung handler cannot admit a replacement past the budget.
    pub fn try_admit(
        &self,
        node: NodeId,
        policy: weft_core::diagram::ConcurrencyPolicy,
        max_executions: u32,
    ) -> Result<bool> {
        let mut nodes = self.nodes.lock();
        let runtime = nodes.entry(node).or_default();
        if let Some(bound) = policy.bound() {
            if runtime.in_flight > bound {
                return Err(WeftError::OverAdmission {
                    node,
                    in_flight: runtime.in_flight,
                    max: bound,
                });
            }
        }
        if !policy.admits(runtime.in_flight) || runtime.exec_count >= max_executions {
            return Ok(false);
        }
        runtime.in_flight += 1;
        runtime.exec_count += 1;
        runtime.state = NodeState::Running;
        Ok(true)
    }

    /// Record an execution result and decrement the in-flight counter.
    pub fn settle(&self, node: NodeId, failed: bool) {
        let mut nodes = self.nodes.lock();
        let runtime = nodes.entry(node).or_default();
        runtime.in_flight = runtime.in_flight.saturating_sub(1);
        runtime.state = if failed {
            NodeState::Failed
        } else if runtime.in_flight == 0 {
            NodeState::Completed
        } else {
            NodeState::Running
        };
    }

    pub fn state(&self, node: NodeId) -> NodeState {
        self.nodes
            .lock()
            .get(&node)
            .map_or(NodeState::Pending, |r| r.state)
    }

    pub fn exec_count(&self, node: NodeId) -> u32 {
        self.nodes
            .lock()
            .get(&node)
            .map_or(0, |r| r.exec_count)
    }

    pub fn any_failed(&self) -> bool {
        self.nodes
            .lock()
            .values()
            .any(|r| r.state == NodeState::Failed)
    }

    /// Mark every node that never ran as skipped.
    pub fn finalize(&self) {
        let mut nodes = self.nodes.lock();
        for runtime in nodes.values_mut() {
            if runtime.exec_count == 0 && !runtime.state.is_terminal() {
                runtime.state = NodeState::Skipped;
            }
        }
    }

    /// Copy out `(state, exec_count)` per node.
    pub fn counters(&self) -> HashMap<NodeId, (NodeState, u32)> {
        self.nodes
            .lock()
            .iter()
            .map(|(&id, r)| (id, (r.state, r.exec_count)))
            .collect()
    }

    /// Overwrite counters from checkpoint data.
    pub fn restore_counters(&self, counters: &HashMap<NodeId, (NodeState, u32)>) {
        let mut nodes = self.nodes.lock();
        for (&id, &(state, exec_count)) in counters {
            let runtime = nodes.entry(id).or_default();
            runtime.state = state;
            runtime.exec_count = exec_count;
            runtime.in_flight = 0;
        }
    }
}
