//! Scheduler: per-run state machine and the concurrent drive loop.

mod executor;
mod report;
mod state;

pub use executor::{Scheduler, SchedulerConfig};
pub use report::{NodeReport, RunReport};
pub use state::NodeState;
