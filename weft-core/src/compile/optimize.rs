//! Phase 5: adjacency, topological ranks, and loop-back classification.
//!
//! Loops are never represented as true cycles in the compiled plan: a
//! DFS-based rank pass classifies every edge whose target rank is not
//! greater than its source rank as loop-back, and the remaining edges must
//! form a DAG. Recurrence is handled purely through epoch advancement at
//! run time.

use super::context::Context;
use super::diagnostics::{CompilePhase, Diagnostic};
use crate::diagram::NodeType;
use crate::types::{EdgeId, NodeId};
use std::collections::{HashMap, HashSet, VecDeque};

const PHASE: CompilePhase = CompilePhase::Optimization;

pub(super) fn run(ctx: &mut Context<'_>) {
    build_adjacency(ctx);
    compute_ranks(ctx);
    classify_loop_backs(ctx);
    check_base_dag(ctx);
    find_loop_participants(ctx);
    warn_unreachable(ctx);
}

fn build_adjacency(ctx: &mut Context<'_>) {
    for node in &ctx.nodes {
        ctx.outgoing.entry(node.id).or_default();
        ctx.incoming.entry(node.id).or_default();
    }
    for (idx, edge) in ctx.edges.iter().enumerate() {
        let id = EdgeId::new(idx as u32);
        ctx.outgoing.entry(edge.from_node).or_default().push(id);
        ctx.incoming.entry(edge.to_node).or_default().push(id);
    }
}

/// Iterative DFS assigning ranks by reverse post-order.
///
/// Roots are tried in ID order with the start node first, so ranks are
/// deterministic for a given description.
fn compute_ranks(ctx: &mut Context<'_>) {
    let node_count = ctx.nodes.len();
    let mut post_order: Vec<NodeId> = Vec::with_capacity(node_count);
    let mut visited: HashSet<NodeId> = HashSet::with_capacity(node_count);

    let mut roots: Vec<NodeId> = Vec::with_capacity(node_count);
    roots.extend(
        ctx.nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Start)
            .map(|n| n.id),
    );
    roots.extend(ctx.nodes.iter().map(|n| n.id));

    for root in roots {
        if visited.contains(&root) {
            continue;
        }
        // (node, next outgoing-edge index) pairs form the explicit stack.
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
        visited.insert(root);

        while let Some((node, edge_idx)) = stack.pop() {
            let successors = &ctx.outgoing[&node];
            if edge_idx < successors.len() {
                stack.push((node, edge_idx + 1));
                let target = ctx.edges[successors[edge_idx].index()].to_node;
                if visited.insert(target) {
                    stack.push((target, 0));
                }
            } else {
                post_order.push(node);
            }
        }
    }

    let mut ranks = HashMap::with_capacity(node_count);
    for (idx, node) in post_order.iter().rev().enumerate() {
        ranks.insert(*node, idx as u32);
    }
    ctx.ranks = ranks;
}

fn classify_loop_backs(ctx: &mut Context<'_>) {
    for (idx, edge) in ctx.edges.iter().enumerate() {
        let from_rank = ctx.ranks[&edge.from_node];
        let to_rank = ctx.ranks[&edge.to_node];
        if to_rank <= from_rank {
            ctx.attrs[idx].loop_back = true;
        }
    }
}

/// Kahn's algorithm over the non-loop-back edges. Any node left unvisited
/// sits on an unrecognized cycle.
fn check_base_dag(ctx: &mut Context<'_>) {
    let mut in_degree: HashMap<NodeId, usize> =
        ctx.nodes.iter().map(|n| (n.id, 0)).collect();
    for (idx, edge) in ctx.edges.iter().enumerate() {
        if !ctx.attrs[idx].loop_back {
            *in_degree.entry(edge.to_node).or_default() += 1;
        }
    }

    let mut queue: VecDeque<NodeId> = ctx
        .nodes
        .iter()
        .filter(|n| in_degree[&n.id] == 0)
        .map(|n| n.id)
        .collect();

    let mut visited = 0usize;
    while let Some(node) = queue.pop_front() {
        visited += 1;
        for &edge_id in &ctx.outgoing[&node] {
            if ctx.attrs[edge_id.index()].loop_back {
                continue;
            }
            let target = ctx.edges[edge_id.index()].to_node;
            if let Some(degree) = in_degree.get_mut(&target) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(target);
                }
            }
        }
    }

    if visited != ctx.nodes.len() {
        let cyclic: Vec<String> = ctx
            .nodes
            .iter()
            .filter(|n| in_degree[&n.id] > 0)
            .map(|n| n.name.clone())
            .collect();
        ctx.diagnostics.push(Diagnostic::error(
            PHASE,
            format!("unrecognized cycle involving nodes {cyclic:?}"),
        ));
    }
}

/// Nodes on a cycle closed by a loop-back edge `tail -> head`: everything
/// forward-reachable from the head that also reaches the tail, over the
/// base DAG.
fn find_loop_participants(ctx: &mut Context<'_>) {
    let mut participants = HashSet::new();
    for (idx, edge) in ctx.edges.iter().enumerate() {
        if !ctx.attrs[idx].loop_back {
            continue;
        }
        let from_head = walk(ctx, edge.to_node, Direction::Forward);
        let to_tail = walk(ctx, edge.from_node, Direction::Backward);
        participants.extend(from_head.intersection(&to_tail).copied());
    }
    ctx.loop_participants = participants;
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

fn walk(ctx: &Context<'_>, origin: NodeId, direction: Direction) -> HashSet<NodeId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([origin]);
    while let Some(node) = queue.pop_front() {
        if !visited.insert(node) {
            continue;
        }
        let edge_ids = match direction {
            Direction::Forward => &ctx.outgoing[&node],
            Direction::Backward => &ctx.incoming[&node],
        };
        for &edge_id in edge_ids {
            if ctx.attrs[edge_id.index()].loop_back {
                continue;
            }
            let edge = &ctx.edges[edge_id.index()];
            queue.push_back(match direction {
                Direction::Forward => edge.to_node,
                Direction::Backward => edge.from_node,
            });
        }
    }
    visited
}

fn warn_unreachable(ctx: &mut Context<'_>) {
    let Some(start) = ctx.nodes.iter().find(|n| n.node_type == NodeType::Start) else {
        return;
    };
    let mut reachable = HashSet::new();
    let mut queue = VecDeque::from([start.id]);
    while let Some(node) = queue.pop_front() {
        if !reachable.insert(node) {
            continue;
        }
        for &edge_id in &ctx.outgoing[&node] {
            queue.push_back(ctx.edges[edge_id.index()].to_node);
        }
    }

    let mut diagnostics = Vec::new();
    for node in &ctx.nodes {
        if !reachable.contains(&node.id) {
            tracing::warn!(node = %node.name, "node is unreachable from the start node");
            diagnostics.push(
                Diagnostic::warning(
                    PHASE,
                    format!("node '{}' is unreachable from the start node", node.name),
                )
                .with_node(&node.name),
            );
        }
    }
    ctx.diagnostics.extend(diagnostics);
}
