//! Testing utilities: deterministic stock handlers and registries.
//!
//! These handlers implement the node types with the simplest observable
//! behavior, so tests can drive real diagrams end to end without mocking
//! the engine itself.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use weft_core::prelude::*;
//! use weft_executor::scheduler::{Scheduler, SchedulerConfig};
//! use weft_executor::testing::stock_registry;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> weft_core::Result<()> {
//! let desc = DiagramDescription::new("demo")
//!     .node(NodeDescription::new("entry", "start"))
//!     .node(NodeDescription::new("exit", "endpoint"))
//!     .connect("entry", "exit");
//! let diagram = Arc::new(Compiler::new().compile(&desc)?);
//!
//! let scheduler = Scheduler::new(SchedulerConfig::default(), Arc::new(stock_registry()));
//! let report = scheduler.run(diagram, Envelope::new(serde_json::json!(1))).await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

use crate::handler::{Handler, HandlerFuture, HandlerOutputs, MapRegistry, RunContext};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use weft_core::diagram::NodeType;
use weft_core::envelope::Envelope;
use weft_core::error::WeftError;

/// Forwards the first input to `out`; with no inputs, forwards null data
/// as an empty object so downstream ports still fire.
#[derive(Debug, Default)]
pub struct PassthroughHandler;

impl Handler for PassthroughHandler {
    fn execute<'a>(
        &'a self,
        _ctx: RunContext,
        inputs: HashMap<String, Envelope>,
        _config: &'a serde_json::Value,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let payload = inputs
                .into_values()
                .next()
                .unwrap_or_else(|| Envelope::new(serde_json::json!({})));
            Ok(HandlerOutputs::from([("out".to_string(), payload)]))
        })
    }
}

/// Emits the configured `value` on `out`, ignoring inputs.
#[derive(Debug, Default)]
pub struct EmitHandler;

impl Handler for EmitHandler {
    fn execute<'a>(
        &'a self,
        _ctx: RunContext,
        _inputs: HashMap<String, Envelope>,
        config: &'a serde_json::Value,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let value = config.get("value").cloned().unwrap_or(serde_json::Value::Null);
            Ok(HandlerOutputs::from([(
                "out".to_string(),
                Envelope::new(value),
            )]))
        })
    }
}

/// Routes the input to `true` or `false` based on the compiled `predicate`
/// config field.
#[derive(Debug, Default)]
pub struct ConditionHandler;

impl Handler for ConditionHandler {
    fn execute<'a>(
        &'a self,
        _ctx: RunContext,
        inputs: HashMap<String, Envelope>,
        config: &'a serde_json::Value,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let decision = config
                .get("predicate")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(true);
            let port = if decision { "true" } else { "false" };
            let payload = inputs
                .into_values()
                .next()
                .unwrap_or_else(|| Envelope::new(serde_json::json!({})));
            Ok(HandlerOutputs::from([(port.to_string(), payload)]))
        })
    }
}

/// Always fails with the configured `message`.
#[derive(Debug, Default)]
pub struct FailHandler;

impl Handler for FailHandler {
    fn execute<'a>(
        &'a self,
        ctx: RunContext,
        _inputs: HashMap<String, Envelope>,
        config: &'a serde_json::Value,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let cause = config
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("forced failure")
                .to_string();
            Err(WeftError::HandlerFailed {
                node: ctx.node_id,
                run: ctx.run_id,
                cause,
            })
        })
    }
}

/// Passthrough that counts executions and records the peak number of
/// simultaneously running invocations.
#[derive(Debug, Default)]
pub struct CountingHandler {
    executions: AtomicU32,
    running: AtomicU32,
    peak: AtomicU32,
    /// Artificial work duration per invocation, to widen overlap windows.
    pub delay_ms: u64,
}

impl CountingHandler {
    /// Create a counter that sleeps `delay_ms` per invocation.
    #[must_use]
    pub fn with_delay(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::default()
        }
    }

    /// Total completed invocations.
    #[must_use]
    pub fn executions(&self) -> u32 {
        self.executions.load(Ordering::SeqCst)
    }

    /// Highest observed overlap.
    #[must_use]
    pub fn peak_concurrency(&self) -> u32 {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Handler for CountingHandler {
    fn execute<'a>(
        &'a self,
        _ctx: RunContext,
        inputs: HashMap<String, Envelope>,
        _config: &'a serde_json::Value,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.executions.fetch_add(1, Ordering::SeqCst);

            let payload = inputs
                .into_values()
                .next()
                .unwrap_or_else(|| Envelope::new(serde_json::json!({})));
            Ok(HandlerOutputs::from([("out".to_string(), payload)]))
        })
    }
}

/// Consumes everything and fires nothing. The terminal node behavior.
#[derive(Debug, Default)]
pub struct SinkHandler;

impl Handler for SinkHandler {
    fn execute<'a>(
        &'a self,
        _ctx: RunContext,
        _inputs: HashMap<String, Envelope>,
        _config: &'a serde_json::Value,
    ) -> HandlerFuture<'a> {
        Box::pin(async { Ok(HandlerOutputs::new()) })
    }
}

/// A registry wiring every node type to its simplest useful handler.
#[must_use]
pub fn stock_registry() -> MapRegistry {
    MapRegistry::new()
        .with(NodeType::Start, Arc::new(PassthroughHandler))
        .with(NodeType::Task, Arc::new(PassthroughHandler))
        .with(NodeType::Loop, Arc::new(PassthroughHandler))
        .with(NodeType::Merge, Arc::new(PassthroughHandler))
        .with(NodeType::Condition, Arc::new(ConditionHandler))
        .with(NodeType::Endpoint, Arc::new(SinkHandler))
}
