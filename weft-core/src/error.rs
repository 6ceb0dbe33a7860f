//! Error types for Weft.
//!
//! Errors carry stable codes and the identifiers needed to localize a
//! failure (run ID, node ID, edge ID). Compile-time problems are reported
//! as phase-tagged diagnostics; only the final compiler gate converts an
//! error-bearing diagnostics list into a `WeftError`.

use crate::compile::Diagnostic;
use crate::types::{EdgeId, Epoch, NodeId, RunId};
use thiserror::Error;

/// The main error type for Weft operations.
#[derive(Error, Debug)]
pub enum WeftError {
    // =========================================================================
    // Compilation errors (E100-E199)
    // =========================================================================
    /// Compilation produced error-level diagnostics; no diagram was assembled.
    #[error("E101: compilation failed with {error_count} error(s)")]
    CompileFailed {
        /// Number of error-level diagnostics.
        error_count: usize,
        /// The full diagnostics list, warnings included.
        diagnostics: Vec<Diagnostic>,
    },

    // =========================================================================
    // Token manager errors (E200-E299)
    // =========================================================================
    /// An edge ID outside the diagram's edge list.
    #[error("E201: unknown edge {edge}")]
    UnknownEdge {
        /// The edge that was not found.
        edge: EdgeId,
    },

    /// A node ID outside the diagram's node map.
    #[error("E202: unknown node {node}")]
    UnknownNode {
        /// The node that was not found.
        node: NodeId,
    },

    /// A branching node fired more than one mutually-exclusive output port.
    #[error("E203: node {node} fired conflicting branch ports {ports:?} in {epoch}")]
    BranchConflict {
        /// The branching node.
        node: NodeId,
        /// The ports that fired.
        ports: Vec<String>,
        /// The epoch in which the conflict occurred.
        epoch: Epoch,
    },

    // =========================================================================
    // Execution errors (E300-E399)
    // =========================================================================
    /// No handler registered for a node type.
    #[error("E301: no handler registered for node type '{type_tag}'")]
    HandlerNotFound {
        /// The node type without a handler.
        type_tag: String,
    },

    /// A handler returned a failure.
    #[error("E302: node {node} failed in {run}: {cause}")]
    HandlerFailed {
        /// The node whose handler failed.
        node: NodeId,
        /// The run in which the failure occurred.
        run: RunId,
        /// Reason reported by the handler.
        cause: String,
    },

    /// A handler exceeded its execution timeout.
    #[error("E303: node {node} timed out after {timeout_ms}ms in {run}")]
    NodeTimeout {
        /// The node that timed out.
        node: NodeId,
        /// The run in which the timeout occurred.
        run: RunId,
        /// The timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The run was cancelled before reaching quiescence.
    #[error("E304: {run} was cancelled")]
    RunCancelled {
        /// The cancelled run.
        run: RunId,
    },

    /// Epoch advancement hit the configured bound.
    #[error("E305: {run} exceeded the epoch bound ({max_epochs})")]
    EpochLimit {
        /// The run that hit the bound.
        run: RunId,
        /// The configured maximum number of epochs.
        max_epochs: u32,
    },

    /// Too many concurrent runs.
    #[error("E306: run concurrency limit reached: {current}/{max}")]
    RunLimit {
        /// Current number of active runs.
        current: usize,
        /// Maximum allowed active runs.
        max: usize,
    },

    /// A spawned node task panicked.
    #[error("E307: node {node} panicked in {run}: {message}")]
    NodePanic {
        /// The node whose task panicked.
        node: NodeId,
        /// The run in which the panic occurred.
        run: RunId,
        /// The panic message.
        message: String,
    },

    // =========================================================================
    // Scheduler invariant violations (E400-E499)
    //
    // These indicate engine bugs, not workflow bugs, and abort the run.
    // =========================================================================
    /// A consume cursor moved past the published sequence.
    #[error("E401: cursor regression on edge {edge} for node {node} in {epoch}")]
    CursorRegression {
        /// The consuming node.
        node: NodeId,
        /// The affected edge.
        edge: EdgeId,
        /// The epoch of the regression.
        epoch: Epoch,
    },

    /// More in-flight executions than the node's concurrency policy allows.
    #[error("E402: over-admission on node {node}: {in_flight} in flight, {max} allowed")]
    OverAdmission {
        /// The over-admitted node.
        node: NodeId,
        /// Observed in-flight count.
        in_flight: u32,
        /// The policy bound.
        max: u32,
    },

    /// An inbound claim advanced some cursors but not others.
    #[error("E403: partial consumption detected for node {node} in {epoch}")]
    PartialConsumption {
        /// The consuming node.
        node: NodeId,
        /// The epoch of the partial claim.
        epoch: Epoch,
    },
}

impl WeftError {
    /// Get the stable error code (e.g., "E101").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::CompileFailed { .. } => "E101",
            Self::UnknownEdge { .. } => "E201",
            Self::UnknownNode { .. } => "E202",
            Self::BranchConflict { .. } => "E203",
            Self::HandlerNotFound { .. } => "E301",
            Self::HandlerFailed { .. } => "E302",
            Self::NodeTimeout { .. } => "E303",
            Self::RunCancelled { .. } => "E304",
            Self::EpochLimit { .. } => "E305",
            Self::RunLimit { .. } => "E306",
            Self::NodePanic { .. } => "E307",
            Self::CursorRegression { .. } => "E401",
            Self::OverAdmission { .. } => "E402",
            Self::PartialConsumption { .. } => "E403",
        }
    }

    /// Check if this error is a compilation error.
    #[must_use]
    pub fn is_compile_error(&self) -> bool {
        matches!(self, Self::CompileFailed { .. })
    }

    /// Check if this error is an internal scheduler invariant violation.
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::CursorRegression { .. }
                | Self::OverAdmission { .. }
                | Self::PartialConsumption { .. }
        )
    }
}

/// Result type alias using `WeftError`.
pub type Result<T> = std::result::Result<T, WeftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        let err = WeftError::HandlerNotFound {
            type_tag: "task".to_string(),
        };
        assert_eq!(err.code(), "E301");

        let err = WeftError::CursorRegression {
            node: NodeId::new(3),
            edge: EdgeId::new(1),
            epoch: Epoch::ZERO,
        };
        assert_eq!(err.code(), "E401");
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn error_display_includes_ids() {
        let err = WeftError::NodeTimeout {
            node: NodeId::new(5),
            run: RunId::new(),
            timeout_ms: 5000,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("E303"));
        assert!(msg.contains("node_5"));
        assert!(msg.contains("5000ms"));
    }

    #[test]
    fn compile_classification() {
        let err = WeftError::CompileFailed {
            error_count: 1,
            diagnostics: Vec::new(),
        };
        assert_eq!(err.code(), "E101");
        assert!(err.is_compile_error());
        assert!(!WeftError::RunCancelled { run: RunId::new() }.is_compile_error());
    }

    #[test]
    fn invariant_classification() {
        assert!(!WeftError::RunCancelled { run: RunId::new() }.is_invariant_violation());
        assert!(
            WeftError::OverAdmission {
                node: NodeId::new(0),
                in_flight: 2,
                max: 1
            }
            .is_invariant_violation()
        );
    }
}
