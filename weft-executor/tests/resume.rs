//! Resuming checkpointed runs.
//!
//! A snapshot restores node counters and token state; driving the restored
//! run picks up exactly where the checkpoint left off.

mod common;

use common::{compile, seed, test_scheduler_config};
use std::collections::HashMap;
use std::sync::Arc;
use weft_core::diagram::{DiagramDescription, NodeDescription};
use weft_core::envelope::Envelope;
use weft_core::types::{Epoch, RunId};
use weft_executor::scheduler::{NodeState, Scheduler};
use weft_executor::snapshot::{NodeCheckpoint, RunSnapshot};
use weft_executor::testing::stock_registry;
use weft_executor::tokens::TokenManager;

fn linear() -> DiagramDescription {
    DiagramDescription::new("linear")
        .node(NodeDescription::new("entry", "start"))
        .node(NodeDescription::new("work", "task"))
        .node(NodeDescription::new("exit", "endpoint"))
        .connect("entry", "work")
        .connect("work", "exit")
}

#[tokio::test]
async fn resume_does_not_refire_the_start_node() {
    let diagram = compile(&linear());
    let entry = diagram.node_by_name("entry").unwrap().id;
    let work = diagram.node_by_name("work").unwrap().id;
    let exit = diagram.node_by_name("exit").unwrap().id;

    // Checkpoint taken after the start node fired, before the task consumed
    // its token.
    let tokens = TokenManager::new(Arc::clone(&diagram));
    let (seed_edge, _) = diagram.outgoing_edges(entry).next().unwrap();
    tokens
        .publish_token(seed_edge, Envelope::new(seed()), Epoch::ZERO)
        .unwrap();

    let snapshot = RunSnapshot {
        run_id: RunId::new(),
        diagram: diagram.name().to_string(),
        nodes: HashMap::from([
            (
                entry,
                NodeCheckpoint {
                    state: NodeState::Completed,
                    exec_count: 1,
                },
            ),
            (
                work,
                NodeCheckpoint {
                    state: NodeState::Pending,
                    exec_count: 0,
                },
            ),
            (
                exit,
                NodeCheckpoint {
                    state: NodeState::Pending,
                    exec_count: 0,
                },
            ),
        ]),
        tokens: tokens.snapshot(),
    };

    let scheduler = Scheduler::new(test_scheduler_config(), Arc::new(stock_registry()));
    let report = scheduler
        .resume(Arc::clone(&diagram), snapshot)
        .await
        .unwrap();

    assert!(report.is_success());
    // The restored execution count keeps the start node from firing again;
    // the rest of the diagram runs off the checkpointed token.
    assert_eq!(report.executions_of(entry), 1);
    assert_eq!(report.executions_of(work), 1);
    assert_eq!(report.executions_of(exit), 1);
    assert_eq!(report.state_of(entry), Some(NodeState::Completed));
}

#[tokio::test]
async fn resuming_a_finished_checkpoint_is_quiescent() {
    let diagram = compile(&linear());
    let scheduler = Scheduler::new(test_scheduler_config(), Arc::new(stock_registry()));
    let first = scheduler
        .run(Arc::clone(&diagram), Envelope::new(seed()))
        .await
        .unwrap();

    let resumed = scheduler
        .resume(Arc::clone(&diagram), first.checkpoint.clone())
        .await
        .unwrap();

    // Every token was already consumed, so nothing runs again.
    let work = diagram.node_by_name("work").unwrap().id;
    assert_eq!(resumed.executions_of(work), 1);
    assert_eq!(resumed.epochs_used, 1);
    assert!(resumed.is_success());
}
