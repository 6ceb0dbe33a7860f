//! Phase 1: structural validation of the raw description.

use super::context::Context;
use super::diagnostics::{CompilePhase, Diagnostic};
use crate::diagram::NodeType;
use std::collections::HashSet;

const PHASE: CompilePhase = CompilePhase::Validation;

pub(super) fn run(ctx: &mut Context<'_>) {
    check_node_names(ctx);
    check_node_types(ctx);
    check_start_count(ctx);
    check_connection_references(ctx);
}

fn check_node_names(ctx: &mut Context<'_>) {
    let mut seen = HashSet::new();
    for node in &ctx.desc.nodes {
        if node.name.is_empty() {
            ctx.diagnostics
                .push(Diagnostic::error(PHASE, "node name must not be empty"));
            continue;
        }
        if !seen.insert(node.name.as_str()) {
            ctx.diagnostics.push(
                Diagnostic::error(PHASE, format!("duplicate node name '{}'", node.name))
                    .with_node(&node.name),
            );
        }
    }
}

fn check_node_types(ctx: &mut Context<'_>) {
    for node in &ctx.desc.nodes {
        if NodeType::parse(&node.type_tag).is_none() {
            ctx.diagnostics.push(
                Diagnostic::error(PHASE, format!("unknown node type '{}'", node.type_tag))
                    .with_node(&node.name),
            );
        }
    }
}

fn check_start_count(ctx: &mut Context<'_>) {
    let starts: Vec<&str> = ctx
        .desc
        .nodes
        .iter()
        .filter(|n| n.enabled && NodeType::parse(&n.type_tag) == Some(NodeType::Start))
        .map(|n| n.name.as_str())
        .collect();

    match starts.len() {
        1 => {}
        0 => ctx.diagnostics.push(Diagnostic::error(
            PHASE,
            "diagram must contain exactly one start node, found none",
        )),
        n => {
            for name in starts {
                ctx.diagnostics.push(
                    Diagnostic::error(
                        PHASE,
                        format!("diagram must contain exactly one start node, found {n}"),
                    )
                    .with_node(name),
                );
            }
        }
    }
}

fn check_connection_references(ctx: &mut Context<'_>) {
    let mut diagnostics = Vec::new();
    for conn in &ctx.desc.connections {
        for endpoint in [conn.from_node(), conn.to_node()] {
            match ctx.desc.find_node(endpoint) {
                None => diagnostics.push(Diagnostic::error(
                    PHASE,
                    format!("connection references unknown node '{endpoint}'"),
                )),
                Some(node) if !node.enabled => diagnostics.push(
                    Diagnostic::warning(
                        PHASE,
                        format!("connection references disabled node '{endpoint}'"),
                    )
                    .with_node(endpoint),
                ),
                Some(_) => {}
            }
        }
    }
    ctx.diagnostics.extend(diagnostics);
}
