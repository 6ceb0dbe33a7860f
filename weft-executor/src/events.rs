//! Execution event stream.
//!
//! The scheduler reports lifecycle transitions to an [`EventSink`]; the
//! engine itself never transports or persists events. Sinks must be cheap:
//! they are called from the drive loop.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use weft_core::types::{Epoch, NodeId, RunId};

/// What happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// A node execution was admitted and spawned.
    NodeStart {
        /// The node.
        node: NodeId,
        /// The epoch its inputs were consumed in.
        epoch: Epoch,
    },
    /// A node execution returned successfully.
    NodeComplete {
        /// The node.
        node: NodeId,
        /// The epoch of the execution.
        epoch: Epoch,
    },
    /// A node execution failed, timed out, or panicked.
    NodeFailed {
        /// The node.
        node: NodeId,
        /// The epoch of the execution.
        epoch: Epoch,
        /// Failure description.
        reason: String,
    },
    /// The run advanced to a new epoch.
    EpochBegin {
        /// The new epoch.
        epoch: Epoch,
    },
    /// The run reached a terminal state.
    RunComplete {
        /// Epochs used, inclusive of epoch 0.
        epochs_used: u32,
    },
}

/// One timestamped execution event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    /// Emission time, nanoseconds since the Unix epoch.
    pub timestamp_ns: u64,
    /// The run the event belongs to.
    pub run_id: RunId,
    /// What happened.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl ExecutionEvent {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn now(run_id: RunId, kind: EventKind) -> Self {
        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self {
            timestamp_ns,
            run_id,
            kind,
        }
    }
}

/// Receiver for execution events.
pub trait EventSink: Send + Sync {
    /// Accept one event.
    fn emit(&self, event: ExecutionEvent);
}

/// In-memory sink collecting events in order.
#[derive(Debug, Default)]
pub struct BufferedSink {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl BufferedSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy out everything collected so far.
    #[must_use]
    pub fn drain(&self) -> Vec<ExecutionEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for BufferedSink {
    fn emit(&self, event: ExecutionEvent) {
        self.events.lock().push(event);
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: ExecutionEvent) {}
}
