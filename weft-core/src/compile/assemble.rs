//! Phase 6: policy resolution and final plan construction.

use super::context::Context;
use super::diagnostics::{CompilePhase, Diagnostic};
use crate::diagram::{ConcurrencyPolicy, ExecutableDiagram, JoinPolicy, NodeType};
use crate::types::NodeId;
use std::collections::{HashMap, HashSet, VecDeque};

const PHASE: CompilePhase = CompilePhase::Assembly;

pub(super) fn run(ctx: &mut Context<'_>) {
    check_k_of_n_bounds(ctx);
    resolve_policies(ctx);
}

/// An explicit `k_of_n` must be satisfiable: at least one and no more
/// than the node's inbound edge count.
fn check_k_of_n_bounds(ctx: &mut Context<'_>) {
    let mut diagnostics = Vec::new();
    for node in &ctx.nodes {
        let Some(JoinPolicy::KOfN { k }) = ctx.overrides[&node.id].join else {
            continue;
        };
        let inbound = ctx.incoming.get(&node.id).map_or(0, Vec::len);
        if k == 0 || k as usize > inbound {
            diagnostics.push(
                Diagnostic::error(
                    PHASE,
                    format!(
                        "k_of_n join on '{}' requires 1 <= k <= {} inbound edges, got k={}",
                        node.name, inbound, k
                    ),
                )
                .with_node(&node.name),
            );
        }
    }
    ctx.diagnostics.extend(diagnostics);
}

fn resolve_policies(ctx: &mut Context<'_>) {
    let joins: Vec<JoinPolicy> = ctx
        .nodes
        .iter()
        .map(|node| {
            if let Some(join) = ctx.overrides[&node.id].join {
                return join;
            }
            let inbound = ctx.incoming.get(&node.id).map_or(0, Vec::len);
            if matches!(node.node_type, NodeType::Merge | NodeType::Loop) {
                // Merge collects whichever branch arrives; a loop head sees
                // its seed edge in epoch 0 and its loop-back edge afterward,
                // never both at once.
                JoinPolicy::Any
            } else if inbound >= 2 && has_branching_ancestor(ctx, node.id) {
                // Fan-in below a branch point: the losing branch never
                // delivers, so waiting for every edge would deadlock.
                JoinPolicy::Any
            } else {
                JoinPolicy::All
            }
        })
        .collect();

    for (node, join) in ctx.nodes.iter_mut().zip(joins) {
        node.join = join;
        node.concurrency = match node.node_type {
            // Branch decisions and iteration counters carry per-epoch
            // state that must not interleave.
            NodeType::Condition | NodeType::Loop => ConcurrencyPolicy::Singleton,
            _ => ctx.overrides[&node.id]
                .concurrency
                .unwrap_or(ConcurrencyPolicy::Singleton),
        };
    }
}

/// Reverse BFS over the base DAG looking for a branching node upstream.
fn has_branching_ancestor(ctx: &Context<'_>, node: NodeId) -> bool {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([node]);
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        let Some(edge_ids) = ctx.incoming.get(&current) else {
            continue;
        };
        for &edge_id in edge_ids {
            if ctx.attrs[edge_id.index()].loop_back {
                continue;
            }
            let source = ctx.edges[edge_id.index()].from_node;
            if ctx.node(source).node_type.is_branching() {
                return true;
            }
            queue.push_back(source);
        }
    }
    false
}

/// Consume an error-free context into the final plan.
pub(super) fn into_diagram(ctx: Context<'_>) -> ExecutableDiagram {
    let order: Vec<NodeId> = ctx.nodes.iter().map(|n| n.id).collect();
    let nodes: HashMap<NodeId, _> = ctx.nodes.into_iter().map(|n| (n.id, n)).collect();
    ExecutableDiagram {
        name: ctx.desc.name.clone(),
        nodes,
        names: ctx.names,
        order,
        edges: ctx.edges,
        attrs: ctx.attrs,
        outgoing: ctx.outgoing,
        incoming: ctx.incoming,
        ranks: ctx.ranks,
        loop_participants: ctx.loop_participants,
        diagnostics: ctx.diagnostics,
    }
}
