//! Run execution engine.
//!
//! This module drives compiled diagrams with **concurrent node
//! execution**. Nodes run in parallel whenever their join policy is
//! satisfied and their concurrency policy admits another execution.
//!
//! ## Architecture
//!
//! The drive loop repeats three steps:
//! 1. Scan nodes in ID order; admit and spawn every node whose inputs
//!    satisfy its join policy at the active epoch
//! 2. Reap one finished task from the `JoinSet`, publish its outputs, and
//!    rescan
//! 3. At quiescence, advance the epoch if loop-back tokens are pending in
//!    the next one, otherwise finish
//!
//! ## Concurrency Control
//!
//! - `max_concurrent_runs` limits simultaneously driven runs
//! - `max_concurrent_nodes` backpressures node spawns via a semaphore
//! - Per-node admission is atomic: the policy check and the in-flight
//!   increment share one lock acquisition

use super::report::{NodeReport, RunReport};
use super::state::{NodeState, RunState};
use crate::events::{EventKind, EventSink, ExecutionEvent, NullSink};
use crate::handler::{HandlerRegistry, RunContext};
use crate::snapshot::{NodeCheckpoint, RunSnapshot};
use crate::tokens::TokenManager;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use weft_core::diagram::{ExecutableDiagram, NodeType};
use weft_core::envelope::Envelope;
use weft_core::error::{Result, WeftError};
use weft_core::types::{Epoch, NodeId, RunId};

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum simultaneously driven runs.
    pub max_concurrent_runs: usize,
    /// Maximum concurrent node executions per run.
    ///
    /// Set to 1 for sequential execution (debugging).
    pub max_concurrent_nodes: usize,
    /// Timeout per node execution in milliseconds.
    pub node_timeout_ms: u64,
    /// Hard bound on epochs per run, so diagrams without an explicit exit
    /// condition still terminate.
    pub max_epochs: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 100,
            max_concurrent_nodes: 16,
            node_timeout_ms: 30_000,
            max_epochs: 64,
        }
    }
}

impl SchedulerConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `WEFT_MAX_CONCURRENT_RUNS`: Maximum simultaneously driven runs
    /// - `WEFT_MAX_CONCURRENT_NODES`: Maximum concurrent node executions
    /// - `WEFT_NODE_TIMEOUT_MS`: Node execution timeout in milliseconds
    /// - `WEFT_MAX_EPOCHS`: Epoch bound per run
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_runs: env_parse("WEFT_MAX_CONCURRENT_RUNS", defaults.max_concurrent_runs),
            max_concurrent_nodes: env_parse(
                "WEFT_MAX_CONCURRENT_NODES",
                defaults.max_concurrent_nodes,
            ),
            node_timeout_ms: env_parse("WEFT_NODE_TIMEOUT_MS", defaults.node_timeout_ms),
            max_epochs: env_parse("WEFT_MAX_EPOCHS", defaults.max_epochs),
        }
    }

    /// Set the run concurrency limit (builder style).
    #[must_use]
    pub fn with_max_concurrent_runs(mut self, max: usize) -> Self {
        self.max_concurrent_runs = max;
        self
    }

    /// Set the node concurrency limit (builder style).
    #[must_use]
    pub fn with_max_concurrent_nodes(mut self, max: usize) -> Self {
        self.max_concurrent_nodes = max;
        self
    }

    /// Set the per-node timeout (builder style).
    #[must_use]
    pub fn with_node_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.node_timeout_ms = timeout_ms;
        self
    }

    /// Set the epoch bound (builder style).
    #[must_use]
    pub fn with_max_epochs(mut self, max_epochs: u32) -> Self {
        self.max_epochs = max_epochs;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Outcome carried back from a spawned node task.
struct TaskResult {
    node: NodeId,
    epoch: Epoch,
    outcome: Result<HashMap<String, Envelope>>,
}

struct RunCore {
    run_id: RunId,
    diagram: Arc<ExecutableDiagram>,
    tokens: TokenManager,
    state: RunState,
}

impl RunCore {
    fn new(run_id: RunId, diagram: Arc<ExecutableDiagram>) -> Self {
        Self {
            run_id,
            tokens: TokenManager::new(Arc::clone(&diagram)),
            state: RunState::new(&diagram),
            diagram,
        }
    }

    fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run_id: self.run_id,
            diagram: self.diagram.name().to_string(),
            nodes: self
                .state
                .counters()
                .into_iter()
                .map(|(id, (state, exec_count))| (id, NodeCheckpoint { state, exec_count }))
                .collect(),
            tokens: self.tokens.snapshot(),
        }
    }

    fn restore(&self, snapshot: RunSnapshot) {
        let counters = snapshot
            .nodes
            .iter()
            .map(|(&id, cp)| (id, (cp.state, cp.exec_count)))
            .collect();
        self.state.restore_counters(&counters);
        self.tokens.restore(snapshot.tokens);
    }
}

/// Drives runs of compiled diagrams.
pub struct Scheduler<R: HandlerRegistry + 'static> {
    config: SchedulerConfig,
    registry: Arc<R>,
    sink: Arc<dyn EventSink>,
    /// Cancellation tokens of active runs.
    active: DashMap<RunId, CancellationToken>,
}

impl<R: HandlerRegistry + 'static> Scheduler<R> {
    /// Create a scheduler with no event sink.
    #[must_use]
    pub fn new(config: SchedulerConfig, registry: Arc<R>) -> Self {
        Self::with_sink(config, registry, Arc::new(NullSink))
    }

    /// Create a scheduler that reports events to a sink.
    #[must_use]
    pub fn with_sink(
        config: SchedulerConfig,
        registry: Arc<R>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            registry,
            sink,
            active: DashMap::new(),
        }
    }

    /// Number of currently active runs.
    #[must_use]
    pub fn active_runs(&self) -> usize {
        self.active.len()
    }

    /// IDs of currently active runs.
    #[must_use]
    pub fn active_run_ids(&self) -> Vec<RunId> {
        self.active.iter().map(|entry| *entry.key()).collect()
    }

    /// Request cancellation of an active run.
    ///
    /// Returns whether the run was found.
    pub fn cancel(&self, run_id: RunId) -> bool {
        match self.active.get(&run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Execute a diagram to completion.
    ///
    /// The initial input is handed to the start node under the `in` port.
    ///
    /// # Errors
    ///
    /// Returns [`WeftError::RunLimit`] when too many runs are active, and
    /// any error that aborts the run (cancellation, epoch bound, missing
    /// handler, invariant violation).
    #[instrument(skip(self, diagram, input), fields(diagram = %diagram.name()))]
    pub async fn run(
        &self,
        diagram: Arc<ExecutableDiagram>,
        input: Envelope,
    ) -> Result<RunReport> {
        let run_id = RunId::new();
        let core = RunCore::new(run_id, diagram);
        self.drive(core, input).await
    }

    /// Resume a checkpointed run to completion.
    ///
    /// Counters and tokens are restored before driving; the start node's
    /// recorded execution keeps it from re-firing.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`run`](Self::run).
    pub async fn resume(
        &self,
        diagram: Arc<ExecutableDiagram>,
        snapshot: RunSnapshot,
    ) -> Result<RunReport> {
        let core = RunCore::new(snapshot.run_id, diagram);
        core.restore(snapshot);
        self.drive(core, Envelope::null()).await
    }

    async fn drive(&self, core: RunCore, input: Envelope) -> Result<RunReport> {
        let current = self.active.len();
        if current >= self.config.max_concurrent_runs {
            return Err(WeftError::RunLimit {
                current,
                max: self.config.max_concurrent_runs,
            });
        }
        let cancel = CancellationToken::new();
        self.active.insert(core.run_id, cancel.clone());
        let result = self.drive_inner(&core, input, cancel).await;
        self.active.remove(&core.run_id);
        result
    }

    async fn drive_inner(
        &self,
        core: &RunCore,
        input: Envelope,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let run_id = core.run_id;
        let diagram = &core.diagram;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_nodes));
        let mut join_set: JoinSet<TaskResult> = JoinSet::new();
        let mut task_nodes: HashMap<tokio::task::Id, (NodeId, Epoch)> = HashMap::new();
        let mut diagnostics: Vec<String> = Vec::new();
        let mut epoch = core.tokens.current_epoch();
        let mut epochs_used = epoch.as_u32() + 1;

        self.sink
            .emit(ExecutionEvent::now(run_id, EventKind::EpochBegin { epoch }));

        loop {
            if cancel.is_cancelled() {
                join_set.abort_all();
                return Err(WeftError::RunCancelled { run: run_id });
            }

            let mut spawned = false;
            for &node_id in diagram.node_ids() {
                let Some(compiled) = diagram.node(node_id) else {
                    continue;
                };
                if core.state.state(node_id) == NodeState::Failed {
                    continue;
                }
                let ready = if compiled.node_type == NodeType::Start {
                    core.state.exec_count(node_id) == 0
                } else {
                    core.tokens.has_new_inputs(node_id, epoch, compiled.join)
                };
                if !ready {
                    continue;
                }
                let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                    // At the node concurrency limit; reap before spawning
                    // more.
                    break;
                };
                if !core
                    .state
                    .try_admit(node_id, compiled.concurrency, compiled.max_executions)?
                {
                    continue;
                }

                let inputs = if compiled.node_type == NodeType::Start {
                    HashMap::from([("in".to_string(), input.clone())])
                } else {
                    core.tokens.consume_inbound(node_id, epoch)?
                };

                let Some(handler) = self.registry.handler_for(compiled.node_type) else {
                    join_set.abort_all();
                    return Err(WeftError::HandlerNotFound {
                        type_tag: compiled.node_type.as_str().to_string(),
                    });
                };

                let ctx = RunContext {
                    run_id,
                    node_id,
                    node_name: compiled.name.clone(),
                    epoch,
                    cancel: cancel.clone(),
                };
                let config = compiled.config.clone();
                let timeout = Duration::from_millis(self.config.node_timeout_ms);
                let timeout_ms = self.config.node_timeout_ms;
                let task_cancel = cancel.clone();

                self.sink.emit(ExecutionEvent::now(
                    run_id,
                    EventKind::NodeStart {
                        node: node_id,
                        epoch,
                    },
                ));
                tracing::debug!(%run_id, node = %compiled.name, %epoch, "node spawned");

                let handle = join_set.spawn(async move {
                    let _permit = permit;
                    let outcome = tokio::select! {
                        () = task_cancel.cancelled() => Err(WeftError::RunCancelled { run: run_id }),
                        finished = tokio::time::timeout(
                            timeout,
                            handler.execute(ctx, inputs, &config),
                        ) => match finished {
                            Ok(result) => result,
                            Err(_) => Err(WeftError::NodeTimeout {
                                node: node_id,
                                run: run_id,
                                timeout_ms,
                            }),
                        },
                    };
                    TaskResult {
                        node: node_id,
                        epoch,
                        outcome,
                    }
                });
                task_nodes.insert(handle.id(), (node_id, epoch));
                spawned = true;
            }

            if let Some(joined) = join_set.join_next_with_id().await {
                match joined {
                    Ok((task_id, task)) => {
                        task_nodes.remove(&task_id);
                        self.settle_task(core, task, &mut diagnostics)?;
                    }
                    Err(join_err) => {
                        let (node, _epoch) = task_nodes
                            .remove(&join_err.id())
                            .unwrap_or((NodeId::new(0), epoch));
                        core.state.settle(node, true);
                        join_set.abort_all();
                        return Err(WeftError::NodePanic {
                            node,
                            run: run_id,
                            message: join_err.to_string(),
                        });
                    }
                }
                continue;
            }

            if spawned {
                continue;
            }

            // Quiescence: nothing ready, nothing in flight.
            let next = epoch.next();
            if core.tokens.any_unconsumed(next) {
                let budgets_left = diagram.loop_participants().iter().any(|&id| {
                    diagram
                        .node(id)
                        .is_some_and(|n| core.state.exec_count(id) < n.max_executions)
                });
                if !budgets_left {
                    tracing::debug!(%run_id, "loop budgets exhausted, finishing");
                    break;
                }
                if next.as_u32() >= self.config.max_epochs {
                    return Err(WeftError::EpochLimit {
                        run: run_id,
                        max_epochs: self.config.max_epochs,
                    });
                }
                epoch = core.tokens.begin_epoch();
                epochs_used += 1;
                self.sink
                    .emit(ExecutionEvent::now(run_id, EventKind::EpochBegin { epoch }));
                tracing::debug!(%run_id, %epoch, "epoch advanced");
                continue;
            }
            break;
        }

        core.state.finalize();
        self.sink.emit(ExecutionEvent::now(
            run_id,
            EventKind::RunComplete { epochs_used },
        ));
        tracing::info!(
            %run_id,
            epochs_used,
            failed = core.state.any_failed(),
            "run complete"
        );

        Ok(RunReport {
            run_id,
            diagram: diagram.name().to_string(),
            nodes: core
                .state
                .counters()
                .into_iter()
                .map(|(id, (state, exec_count))| (id, NodeReport { state, exec_count }))
                .collect(),
            diagnostics,
            epochs_used,
            checkpoint: core.snapshot(),
        })
    }

    fn settle_task(
        &self,
        core: &RunCore,
        task: TaskResult,
        diagnostics: &mut Vec<String>,
    ) -> Result<()> {
        let run_id = core.run_id;
        match task.outcome {
            Ok(outputs) => {
                core.tokens.emit_outputs(task.node, &outputs, task.epoch)?;
                core.state.settle(task.node, false);
                self.sink.emit(ExecutionEvent::now(
                    run_id,
                    EventKind::NodeComplete {
                        node: task.node,
                        epoch: task.epoch,
                    },
                ));
                Ok(())
            }
            Err(WeftError::RunCancelled { run }) => Err(WeftError::RunCancelled { run }),
            Err(err) => {
                let reason = err.to_string();
                // A declared error port alone is not enough: without an
                // outgoing error edge there is nowhere for the payload to
                // go, and the failure must surface as a failed node.
                let has_error_route = core
                    .diagram
                    .outgoing_edges(task.node)
                    .any(|(_, edge)| edge.from_port == "error");
                if has_error_route {
                    // Routed failures are part of normal flow; the node is
                    // not terminal-failed.
                    let payload = Envelope::new(serde_json::json!({
                        "code": err.code(),
                        "message": reason,
                    }));
                    let outputs = HashMap::from([("error".to_string(), payload)]);
                    core.tokens.emit_outputs(task.node, &outputs, task.epoch)?;
                    core.state.settle(task.node, false);
                    diagnostics.push(format!(
                        "{} routed a failure to its error port: {}",
                        task.node, reason
                    ));
                } else {
                    core.state.settle(task.node, true);
                    diagnostics.push(format!("{} failed: {}", task.node, reason));
                }
                self.sink.emit(ExecutionEvent::now(
                    run_id,
                    EventKind::NodeFailed {
                        node: task.node,
                        epoch: task.epoch,
                        reason,
                    },
                ));
                Ok(())
            }
        }
    }
}

impl<R: HandlerRegistry + 'static> std::fmt::Debug for Scheduler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("active_runs", &self.active.len())
            .finish()
    }
}
