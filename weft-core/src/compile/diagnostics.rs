//! Phase-tagged compilation diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The six compiler phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilePhase {
    /// Structural invariant checks on the raw description.
    Validation,
    /// Raw node descriptions become compiled node entities.
    Transformation,
    /// Connection endpoints resolve to canonical (node, port) pairs.
    Resolution,
    /// Connection-rule checks and edge construction.
    EdgeBuilding,
    /// Adjacency, ranks, and loop-back classification.
    Optimization,
    /// Policy resolution and final diagram construction.
    Assembly,
}

impl CompilePhase {
    /// Get the string tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Transformation => "transformation",
            Self::Resolution => "resolution",
            Self::EdgeBuilding => "edge_building",
            Self::Optimization => "optimization",
            Self::Assembly => "assembly",
        }
    }
}

impl fmt::Display for CompilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Non-blocking anomaly.
    Warning,
    /// Blocks producing a usable diagram.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One compilation finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The phase that produced the finding.
    pub phase: CompilePhase,
    /// Severity.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
    /// Affected node name, if the finding is node-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Affected edge (rendered endpoints), if the finding is edge-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(phase: CompilePhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            severity: Severity::Error,
            message: message.into(),
            node: None,
            edge: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(phase: CompilePhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            severity: Severity::Warning,
            message: message.into(),
            node: None,
            edge: None,
        }
    }

    /// Scope the finding to a node.
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Scope the finding to an edge.
    pub fn with_edge(mut self, edge: impl Into<String>) -> Self {
        self.edge = Some(edge.into());
        self
    }

    /// Whether this diagnostic blocks assembly.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.phase, self.severity, self.message)?;
        if let Some(ref node) = self.node {
            write!(f, " (node '{}')", node)?;
        }
        if let Some(ref edge) = self.edge {
            write!(f, " (edge {})", edge)?;
        }
        Ok(())
    }
}
