//! Phase 4: connection-rule checks and edge construction.

use super::context::Context;
use super::diagnostics::{CompilePhase, Diagnostic};
use super::rules;
use crate::diagram::{Edge, EdgeAttrs, NodeType};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

const PHASE: CompilePhase = CompilePhase::EdgeBuilding;

/// Type-pair default data-transform policy.
///
/// Connection-level overrides win key-by-key at merge time.
fn default_transform(source: NodeType, target: NodeType) -> BTreeMap<String, Value> {
    let mut policy = BTreeMap::new();
    if source.is_branching() {
        // Downstream consumers of a branch see which port fired.
        policy.insert("carry_decision".to_string(), Value::Bool(true));
    }
    if target == NodeType::Merge {
        // Merge handlers distinguish payloads by originating node.
        policy.insert("tag_source".to_string(), Value::Bool(true));
    }
    policy
}

pub(super) fn run(ctx: &mut Context<'_>) {
    let mut seen: HashSet<Edge> = HashSet::new();
    let mut diagnostics = Vec::new();

    for conn in &ctx.resolved {
        let source = ctx.node(conn.from_node);
        let target = ctx.node(conn.to_node);

        if !rules::can_connect(source.node_type, target.node_type) {
            diagnostics.push(
                Diagnostic::error(
                    PHASE,
                    format!(
                        "a {} node may not feed a {} node",
                        source.node_type, target.node_type
                    ),
                )
                .with_edge(format!(
                    "{}.{} -> {}.{}",
                    source.name, conn.from_port, target.name, conn.to_port
                )),
            );
            continue;
        }

        let edge = Edge::new(
            conn.from_node,
            conn.from_port.clone(),
            conn.to_node,
            conn.to_port.clone(),
        );
        if !seen.insert(edge.clone()) {
            diagnostics.push(
                Diagnostic::warning(PHASE, "duplicate connection ignored")
                    .with_edge(ctx.render_edge(&edge)),
            );
            continue;
        }

        let mut transform = default_transform(source.node_type, target.node_type);
        for (key, value) in &conn.transform {
            transform.insert(key.clone(), value.clone());
        }

        ctx.edges.push(edge);
        ctx.attrs.push(EdgeAttrs {
            transform,
            skippable: conn.skippable,
            loop_back: false,
        });
    }

    ctx.diagnostics.extend(diagnostics);
}
