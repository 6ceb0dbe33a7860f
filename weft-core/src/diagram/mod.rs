//! Diagram data model: raw descriptions, compiled entities, and the
//! executable plan.

mod description;
mod edge;
mod executable;
mod node;
mod policy;

pub use description::{ConnectionDescription, DiagramDescription, NodeDescription};
pub use edge::{Edge, EdgeAttrs};
pub use executable::ExecutableDiagram;
pub use node::{CompiledNode, NodeType, DEFAULT_MAX_EXECUTIONS};
pub use policy::{ConcurrencyPolicy, JoinPolicy};
