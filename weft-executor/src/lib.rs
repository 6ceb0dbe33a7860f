//! Weft Executor - Token-based diagram runtime.
//!
//! This crate provides the execution infrastructure for Weft:
//! - Token manager with epoch-scoped sequences and consumption cursors
//! - Concurrent scheduler with join and concurrency policies
//! - Handler traits and a map-backed registry
//! - Execution event stream
//! - Serializable run checkpoints

#![warn(missing_docs)]

pub mod events;
pub mod handler;
pub mod observability;
pub mod scheduler;
pub mod snapshot;
pub mod testing;
pub mod tokens;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::events::{BufferedSink, EventKind, EventSink, ExecutionEvent, NullSink};
    pub use crate::handler::{
        Handler, HandlerFuture, HandlerOutputs, HandlerRegistry, MapRegistry, RunContext,
    };
    pub use crate::scheduler::{NodeReport, NodeState, RunReport, Scheduler, SchedulerConfig};
    pub use crate::snapshot::{RunSnapshot, TokenSnapshot};
    pub use crate::tokens::{Token, TokenManager};
}
