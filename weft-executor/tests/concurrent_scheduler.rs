//! Concurrency limits, cancellation, timeouts, and failure routing.

mod common;

use common::{compile, seed, test_scheduler_config};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use weft_core::diagram::{
    ConnectionDescription, DiagramDescription, NodeDescription, NodeType,
};
use weft_core::envelope::Envelope;
use weft_core::error::WeftError;
use weft_executor::handler::{Handler, HandlerFuture, HandlerOutputs, MapRegistry, RunContext};
use weft_executor::scheduler::{NodeState, Scheduler, SchedulerConfig};
use weft_executor::testing::{CountingHandler, FailHandler, PassthroughHandler, SinkHandler};

/// Sleeps far past any test timeout.
struct StallingHandler;

impl Handler for StallingHandler {
    fn execute<'a>(
        &'a self,
        _ctx: RunContext,
        _inputs: HashMap<String, Envelope>,
        _config: &'a serde_json::Value,
    ) -> HandlerFuture<'a> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(HandlerOutputs::new())
        })
    }
}

fn fan_out(width: usize) -> DiagramDescription {
    let mut desc = DiagramDescription::new("fan-out")
        .node(NodeDescription::new("entry", "start"))
        .node(NodeDescription::new("exit", "endpoint"));
    for i in 0..width {
        let name = format!("task_{i}");
        desc = desc
            .node(NodeDescription::new(&name, "task"))
            .connect("entry", &name)
            .connect(&name, "exit");
    }
    desc
}

fn registry_with_task(task: Arc<dyn Handler>) -> MapRegistry {
    MapRegistry::new()
        .with(NodeType::Start, Arc::new(PassthroughHandler))
        .with(NodeType::Task, task)
        .with(NodeType::Endpoint, Arc::new(SinkHandler))
}

#[tokio::test]
async fn independent_nodes_overlap() {
    let counter = Arc::new(CountingHandler::with_delay(50));
    let diagram = compile(&fan_out(4));
    let scheduler = Scheduler::new(
        test_scheduler_config(),
        Arc::new(registry_with_task(Arc::clone(&counter) as Arc<dyn Handler>)),
    );

    let report = scheduler
        .run(Arc::clone(&diagram), Envelope::new(seed()))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(counter.executions(), 4);
    assert!(
        counter.peak_concurrency() >= 2,
        "peak was {}",
        counter.peak_concurrency()
    );
}

#[tokio::test]
async fn node_concurrency_limit_serializes_execution() {
    let counter = Arc::new(CountingHandler::with_delay(10));
    let diagram = compile(&fan_out(4));
    let config = test_scheduler_config().with_max_concurrent_nodes(1);
    let scheduler = Scheduler::new(
        config,
        Arc::new(registry_with_task(Arc::clone(&counter) as Arc<dyn Handler>)),
    );

    scheduler
        .run(Arc::clone(&diagram), Envelope::new(seed()))
        .await
        .unwrap();

    assert_eq!(counter.executions(), 4);
    assert_eq!(counter.peak_concurrency(), 1);
}

#[tokio::test]
async fn cancellation_aborts_the_run() {
    let diagram = compile(&fan_out(1));
    let scheduler = Arc::new(Scheduler::new(
        SchedulerConfig::default(),
        Arc::new(registry_with_task(Arc::new(StallingHandler))),
    ));

    let canceller = Arc::clone(&scheduler);
    tokio::spawn(async move {
        loop {
            let ids = canceller.active_run_ids();
            if let Some(&run_id) = ids.first() {
                canceller.cancel(run_id);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });

    let err = scheduler
        .run(Arc::clone(&diagram), Envelope::new(seed()))
        .await
        .unwrap_err();
    assert!(matches!(err, WeftError::RunCancelled { .. }));
    assert_eq!(scheduler.active_runs(), 0);
}

#[tokio::test]
async fn timeouts_fail_the_node() {
    let desc = DiagramDescription::new("slow")
        .node(NodeDescription::new("entry", "start"))
        .node(NodeDescription::new("stall", "task").with_outputs(["out"]))
        .node(NodeDescription::new("exit", "endpoint"))
        .connect("entry", "stall")
        .connect("stall", "exit");
    let diagram = compile(&desc);
    let config = test_scheduler_config().with_node_timeout_ms(50);
    let scheduler = Scheduler::new(
        config,
        Arc::new(registry_with_task(Arc::new(StallingHandler))),
    );

    let report = scheduler
        .run(Arc::clone(&diagram), Envelope::new(seed()))
        .await
        .unwrap();

    let stall = diagram.node_by_name("stall").unwrap().id;
    assert_eq!(report.state_of(stall), Some(NodeState::Failed));
    assert!(!report.is_success());
    assert!(report.diagnostics.iter().any(|d| d.contains("E303")));
}

#[tokio::test]
async fn failures_route_to_a_connected_error_port() {
    let desc = DiagramDescription::new("error-route")
        .node(NodeDescription::new("entry", "start"))
        .node(NodeDescription::new("risky", "task").config_field("message", json!("nope")))
        .node(NodeDescription::new("cleanup", "endpoint"))
        .connect("entry", "risky")
        .connection(ConnectionDescription::new("risky.error", "cleanup.in"));
    let diagram = compile(&desc);
    let scheduler = Scheduler::new(
        test_scheduler_config(),
        Arc::new(registry_with_task(Arc::new(FailHandler))),
    );

    let report = scheduler
        .run(Arc::clone(&diagram), Envelope::new(seed()))
        .await
        .unwrap();

    // Routed failures are normal flow: the risky node completes and the
    // cleanup endpoint receives the failure payload.
    assert!(report.is_success());
    let risky = diagram.node_by_name("risky").unwrap().id;
    let cleanup = diagram.node_by_name("cleanup").unwrap().id;
    assert_eq!(report.state_of(risky), Some(NodeState::Completed));
    assert_eq!(report.executions_of(cleanup), 1);
    assert!(!report.diagnostics.is_empty());
}

#[tokio::test]
async fn declared_error_port_without_an_edge_does_not_swallow_failures() {
    // Task nodes declare an error port by default; only a connected error
    // edge turns a failure into routed flow.
    let desc = DiagramDescription::new("unrouted")
        .node(NodeDescription::new("entry", "start"))
        .node(NodeDescription::new("risky", "task"))
        .node(NodeDescription::new("exit", "endpoint"))
        .connect("entry", "risky")
        .connect("risky", "exit");
    let diagram = compile(&desc);
    let scheduler = Scheduler::new(
        test_scheduler_config(),
        Arc::new(registry_with_task(Arc::new(FailHandler))),
    );

    let report = scheduler
        .run(Arc::clone(&diagram), Envelope::new(seed()))
        .await
        .unwrap();

    let risky = diagram.node_by_name("risky").unwrap().id;
    assert_eq!(report.state_of(risky), Some(NodeState::Failed));
    assert!(!report.is_success());
    assert!(report.diagnostics.iter().any(|d| d.contains("E302")));
}

#[tokio::test]
async fn failures_without_an_error_port_are_terminal() {
    let desc = DiagramDescription::new("no-route")
        .node(NodeDescription::new("entry", "start"))
        .node(NodeDescription::new("risky", "task").with_outputs(["out"]))
        .node(NodeDescription::new("exit", "endpoint"))
        .connect("entry", "risky")
        .connect("risky", "exit");
    let diagram = compile(&desc);
    let scheduler = Scheduler::new(
        test_scheduler_config(),
        Arc::new(registry_with_task(Arc::new(FailHandler))),
    );

    let report = scheduler
        .run(Arc::clone(&diagram), Envelope::new(seed()))
        .await
        .unwrap();

    let risky = diagram.node_by_name("risky").unwrap().id;
    let exit = diagram.node_by_name("exit").unwrap().id;
    assert_eq!(report.state_of(risky), Some(NodeState::Failed));
    assert_eq!(report.state_of(exit), Some(NodeState::Skipped));
    assert!(!report.is_success());
}
