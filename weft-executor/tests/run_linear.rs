//! End-to-end run of a linear diagram.
//!
//! Covers the single-pass baseline: every node executes exactly once in
//! epoch 0 and the run reaches quiescence without advancing epochs.

mod common;

use common::{compile, seed, test_scheduler_config};
use std::sync::Arc;
use weft_core::diagram::{DiagramDescription, NodeDescription};
use weft_core::envelope::Envelope;
use weft_executor::events::{BufferedSink, EventKind, EventSink};
use weft_executor::scheduler::{NodeState, Scheduler};
use weft_executor::testing::stock_registry;

fn linear() -> DiagramDescription {
    DiagramDescription::new("linear")
        .node(NodeDescription::new("entry", "start"))
        .node(NodeDescription::new("work", "task"))
        .node(NodeDescription::new("exit", "endpoint"))
        .connect("entry", "work")
        .connect("work", "exit")
}

#[tokio::test]
async fn every_node_runs_once_in_epoch_zero() {
    let diagram = compile(&linear());
    let sink = Arc::new(BufferedSink::new());
    let events: Arc<dyn EventSink> = sink.clone();
    let scheduler =
        Scheduler::with_sink(test_scheduler_config(), Arc::new(stock_registry()), events);

    let report = scheduler
        .run(Arc::clone(&diagram), Envelope::new(serde_json::json!({"seed": 1})))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.epochs_used, 1);
    for node in diagram.nodes() {
        assert_eq!(report.state_of(node.id), Some(NodeState::Completed));
        assert_eq!(report.executions_of(node.id), 1);
    }

    let events = sink.drain();
    let starts = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::NodeStart { .. }))
        .count();
    assert_eq!(starts, 3);
    assert!(matches!(
        events.last().map(|e| &e.kind),
        Some(EventKind::RunComplete { epochs_used: 1 })
    ));
}

#[tokio::test]
async fn null_seed_fires_no_start_output() {
    // A null payload on a port means the port did not fire, so a run
    // seeded with null stops at the start node and skips everything
    // downstream.
    let diagram = compile(&linear());
    let scheduler = Scheduler::new(test_scheduler_config(), Arc::new(stock_registry()));

    let report = scheduler
        .run(Arc::clone(&diagram), Envelope::null())
        .await
        .unwrap();

    let entry = diagram.node_by_name("entry").unwrap().id;
    let work = diagram.node_by_name("work").unwrap().id;
    assert_eq!(report.executions_of(entry), 1);
    assert_eq!(report.executions_of(work), 0);
    assert_eq!(report.state_of(work), Some(NodeState::Skipped));
}

#[tokio::test]
async fn second_scan_finds_nothing_to_consume() {
    // The same diagram driven twice produces independent runs; cursors
    // never leak across runs.
    let diagram = compile(&linear());
    let scheduler = Scheduler::new(test_scheduler_config(), Arc::new(stock_registry()));

    let first = scheduler
        .run(Arc::clone(&diagram), Envelope::new(seed()))
        .await
        .unwrap();
    let second = scheduler
        .run(Arc::clone(&diagram), Envelope::new(seed()))
        .await
        .unwrap();

    assert_ne!(first.run_id, second.run_id);
    let work = diagram.node_by_name("work").unwrap().id;
    assert_eq!(first.executions_of(work), 1);
    assert_eq!(second.executions_of(work), 1);
}
