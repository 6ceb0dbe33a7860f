//! The six-phase diagram compiler.
//!
//! A [`DiagramDescription`] passes through validation, transformation,
//! resolution, edge building, optimization, and assembly. Each phase reads
//! the shared [`Context`] and appends phase-tagged diagnostics; the
//! assembly gate refuses to produce an [`ExecutableDiagram`] while any
//! error-level diagnostic exists.
//!
//! Compilation is deterministic: the same description always yields the
//! same node IDs, edge IDs, ranks, and loop-back classification.

mod assemble;
mod context;
mod diagnostics;
mod edges;
mod optimize;
mod resolve;
mod rules;
mod transform;
mod validate;

pub use diagnostics::{CompilePhase, Diagnostic, Severity};
pub use rules::{can_connect, connection_constraints, ConnectionConstraints};
pub use transform::{TransformHook, TransformRule, TransformTable};

use crate::diagram::{DiagramDescription, ExecutableDiagram};
use crate::error::{Result, WeftError};
use context::Context;

/// Error-handling strategy for a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileMode {
    /// Stop after the first phase that reports an error.
    #[default]
    FailFast,
    /// Run every phase and collect everything reportable.
    Diagnostics,
}

/// The diagram compiler.
///
/// Cheap to construct and reusable across compilations; the transform
/// table is resolved once here, never per node.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    mode: CompileMode,
    transforms: TransformTable,
}

impl Compiler {
    /// A fail-fast compiler with the standard transform table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: CompileMode::FailFast,
            transforms: TransformTable::standard(),
        }
    }

    /// Set the error-handling mode.
    #[must_use]
    pub fn with_mode(mut self, mode: CompileMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the transform table.
    #[must_use]
    pub fn with_transforms(mut self, transforms: TransformTable) -> Self {
        self.transforms = transforms;
        self
    }

    /// Compile a description into an executable plan.
    ///
    /// # Errors
    ///
    /// Returns [`WeftError::CompileFailed`] carrying every collected
    /// diagnostic when any phase reports an error.
    pub fn compile(&self, desc: &DiagramDescription) -> Result<ExecutableDiagram> {
        let mut ctx = Context::new(desc);

        let phases: [fn(&mut Context<'_>, &TransformTable); 6] = [
            |ctx, _| validate::run(ctx),
            |ctx, table| transform::run(ctx, table),
            |ctx, _| resolve::run(ctx),
            |ctx, _| edges::run(ctx),
            |ctx, _| optimize::run(ctx),
            |ctx, _| assemble::run(ctx),
        ];

        for phase in phases {
            phase(&mut ctx, &self.transforms);
            if self.mode == CompileMode::FailFast && ctx.has_errors() {
                break;
            }
        }

        if ctx.has_errors() {
            let error_count = ctx.error_count();
            tracing::debug!(
                diagram = %desc.name,
                error_count,
                "compilation failed"
            );
            return Err(WeftError::CompileFailed {
                error_count,
                diagnostics: ctx.diagnostics,
            });
        }

        let diagram = assemble::into_diagram(ctx);
        tracing::debug!(
            diagram = %diagram.name(),
            nodes = diagram.node_count(),
            edges = diagram.edge_count(),
            "compilation succeeded"
        );
        Ok(diagram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::{ConnectionDescription, JoinPolicy, NodeDescription, NodeType};

    fn linear() -> DiagramDescription {
        DiagramDescription::new("linear")
            .node(NodeDescription::new("begin", "start"))
            .node(NodeDescription::new("work", "task"))
            .node(NodeDescription::new("finish", "endpoint"))
            .connect("begin", "work")
            .connect("work", "finish")
    }

    #[test]
    fn compiles_a_linear_diagram() {
        let diagram = Compiler::new().compile(&linear()).unwrap();
        assert_eq!(diagram.node_count(), 3);
        assert_eq!(diagram.edge_count(), 2);
        assert_eq!(diagram.start_node().unwrap().name, "begin");
        assert!(diagram.loop_participants().is_empty());
    }

    #[test]
    fn node_ids_follow_author_order() {
        let diagram = Compiler::new().compile(&linear()).unwrap();
        let names: Vec<&str> = diagram.nodes().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["begin", "work", "finish"]);
    }

    #[test]
    fn fail_fast_stops_at_the_first_erroring_phase() {
        // Two start nodes fail validation; the bad port reference in
        // resolution must not be reached.
        let desc = DiagramDescription::new("bad")
            .node(NodeDescription::new("a", "start"))
            .node(NodeDescription::new("b", "start"))
            .node(NodeDescription::new("end", "endpoint"))
            .connection(ConnectionDescription::new("a.nonexistent", "end"));

        let err = Compiler::new().compile(&desc).unwrap_err();
        let WeftError::CompileFailed { diagnostics, .. } = err else {
            panic!("expected CompileFailed");
        };
        assert!(diagnostics
            .iter()
            .all(|d| d.phase == CompilePhase::Validation));
    }

    #[test]
    fn diagnostics_mode_collects_across_phases() {
        let desc = DiagramDescription::new("bad")
            .node(NodeDescription::new("a", "start"))
            .node(NodeDescription::new("b", "start"))
            .node(NodeDescription::new("end", "endpoint"))
            .connection(ConnectionDescription::new("a.nonexistent", "end"));

        let err = Compiler::new()
            .with_mode(CompileMode::Diagnostics)
            .compile(&desc)
            .unwrap_err();
        let WeftError::CompileFailed { diagnostics, .. } = err else {
            panic!("expected CompileFailed");
        };
        let phases: std::collections::HashSet<_> =
            diagnostics.iter().map(|d| d.phase).collect();
        assert!(phases.contains(&CompilePhase::Validation));
        assert!(phases.contains(&CompilePhase::Resolution));
    }

    #[test]
    fn merge_nodes_default_to_any_join() {
        let desc = DiagramDescription::new("fanin")
            .node(NodeDescription::new("begin", "start"))
            .node(NodeDescription::new("left", "task"))
            .node(NodeDescription::new("right", "task"))
            .node(NodeDescription::new("collect", "merge"))
            .node(NodeDescription::new("finish", "endpoint"))
            .connect("begin", "left")
            .connect("begin", "right")
            .connect("left", "collect")
            .connect("right", "collect")
            .connect("collect", "finish");

        let diagram = Compiler::new().compile(&desc).unwrap();
        let collect = diagram.node_by_name("collect").unwrap();
        assert_eq!(collect.join, JoinPolicy::Any);
        let left = diagram.node_by_name("left").unwrap();
        assert_eq!(left.join, JoinPolicy::All);
    }

    #[test]
    fn fan_in_below_a_branch_defaults_to_any_join() {
        let desc = DiagramDescription::new("branch-fanin")
            .node(NodeDescription::new("begin", "start"))
            .node(NodeDescription::new("gate", "condition"))
            .node(NodeDescription::new("yes", "task"))
            .node(NodeDescription::new("no", "task"))
            .node(NodeDescription::new("after", "task"))
            .node(NodeDescription::new("finish", "endpoint"))
            .connect("begin", "gate")
            .connection(ConnectionDescription::new("gate.true", "yes"))
            .connection(ConnectionDescription::new("gate.false", "no"))
            .connect("yes", "after")
            .connect("no", "after")
            .connect("after", "finish");

        let diagram = Compiler::new().compile(&desc).unwrap();
        let after = diagram.node_by_name("after").unwrap();
        assert_eq!(after.join, JoinPolicy::Any);
    }

    #[test]
    fn loop_back_edge_is_classified_not_rejected() {
        let desc = DiagramDescription::new("loop")
            .node(NodeDescription::new("begin", "start"))
            .node(NodeDescription::new("again", "loop"))
            .node(NodeDescription::new("body", "task"))
            .node(NodeDescription::new("finish", "endpoint"))
            .connect("begin", "again")
            .connect("again", "body")
            .connection(ConnectionDescription::new("body.out", "again.in"))
            .connection(ConnectionDescription::new("again.out", "finish.in"));

        let diagram = Compiler::new().compile(&desc).unwrap();
        let loop_backs: Vec<_> = (0..diagram.edge_count())
            .map(|i| crate::types::EdgeId::new(i as u32))
            .filter(|&id| diagram.is_loop_back(id))
            .collect();
        assert_eq!(loop_backs.len(), 1);
        let edge = diagram.edge(loop_backs[0]).unwrap();
        assert_eq!(diagram.node(edge.from_node).unwrap().name, "body");
        assert_eq!(diagram.node(edge.to_node).unwrap().name, "again");

        let again = diagram.node_by_name("again").unwrap();
        let body = diagram.node_by_name("body").unwrap();
        assert!(diagram.loop_participants().contains(&again.id));
        assert!(diagram.loop_participants().contains(&body.id));
        assert_eq!(again.node_type, NodeType::Loop);
    }

    #[test]
    fn compilation_is_deterministic() {
        let desc = DiagramDescription::new("repeat")
            .node(NodeDescription::new("begin", "start"))
            .node(NodeDescription::new("a", "task"))
            .node(NodeDescription::new("b", "task"))
            .node(NodeDescription::new("finish", "endpoint"))
            .connect("begin", "a")
            .connect("begin", "b")
            .connect("a", "finish")
            .connect("b", "finish");

        let first = Compiler::new().compile(&desc).unwrap();
        let second = Compiler::new().compile(&desc).unwrap();
        assert_eq!(first.node_ids(), second.node_ids());
        assert_eq!(first.edge_count(), second.edge_count());
        for i in 0..first.edge_count() {
            let id = crate::types::EdgeId::new(i as u32);
            assert_eq!(first.edge(id), second.edge(id));
            assert_eq!(
                first.is_loop_back(id),
                second.is_loop_back(id)
            );
        }
        for &id in first.node_ids() {
            assert_eq!(first.rank(id), second.rank(id));
        }
    }

    #[test]
    fn endpoint_cannot_feed_anything() {
        let desc = DiagramDescription::new("bad-edge")
            .node(NodeDescription::new("begin", "start"))
            .node(NodeDescription::new("finish", "endpoint"))
            .node(NodeDescription::new("late", "task"))
            .connect("begin", "finish")
            .connect("finish", "late");

        let err = Compiler::new().compile(&desc).unwrap_err();
        let WeftError::CompileFailed { diagnostics, .. } = err else {
            panic!("expected CompileFailed");
        };
        // Endpoint declares no output ports, so resolution already rejects
        // the connection before the rule table sees it.
        assert!(diagnostics.iter().any(|d| d.is_error()));
    }

    #[test]
    fn unsatisfiable_k_of_n_is_rejected() {
        let desc = DiagramDescription::new("bad-k")
            .node(NodeDescription::new("begin", "start"))
            .node(
                NodeDescription::new("gather", "task").with_join(JoinPolicy::KOfN { k: 3 }),
            )
            .node(NodeDescription::new("finish", "endpoint"))
            .connect("begin", "gather")
            .connect("gather", "finish");

        let err = Compiler::new().compile(&desc).unwrap_err();
        let WeftError::CompileFailed { diagnostics, .. } = err else {
            panic!("expected CompileFailed");
        };
        assert!(diagnostics
            .iter()
            .any(|d| d.phase == CompilePhase::Assembly && d.is_error()));
    }
}
