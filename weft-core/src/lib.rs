//! Weft Core Library
//!
//! This crate provides the foundational types and the diagram compiler for
//! the Weft dataflow engine.
//!
//! # Overview
//!
//! Weft executes node-and-edge workflow diagrams. A raw
//! [`DiagramDescription`](diagram::DiagramDescription) passes through a
//! six-phase compiler that validates structure, resolves ports, builds
//! edges, classifies loop-back edges, and resolves join and concurrency
//! policies into an immutable
//! [`ExecutableDiagram`](diagram::ExecutableDiagram).
//!
//! # Key Components
//!
//! - **Types**: Strongly-typed identifiers (runs, nodes, edges, tokens,
//!   epochs)
//! - **Diagram**: Descriptions, compiled nodes, edges, and policies
//! - **Compile**: The six-phase compiler and its diagnostics
//! - **Envelope**: The immutable payload wrapper flowing along edges
//!
//! # Example
//!
//! ```
//! use weft_core::prelude::*;
//!
//! let desc = DiagramDescription::new("demo")
//!     .node(NodeDescription::new("entry", "start"))
//!     .node(NodeDescription::new("work", "task"))
//!     .node(NodeDescription::new("exit", "endpoint"))
//!     .connect("entry", "work")
//!     .connect("work", "exit");
//!
//! let diagram = Compiler::new().compile(&desc)?;
//! assert_eq!(diagram.node_count(), 3);
//! # Ok::<(), weft_core::WeftError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compile;
pub mod diagram;
pub mod envelope;
pub mod error;
pub mod prelude;
pub mod types;

// Re-export key types at crate root for convenience
pub use compile::{CompileMode, Compiler, Diagnostic};
pub use diagram::{DiagramDescription, ExecutableDiagram};
pub use envelope::Envelope;
pub use error::{Result, WeftError};
pub use types::{EdgeId, Epoch, NodeId, RunId, TokenId};
