//! Prelude for convenient imports.
//!
//! This module re-exports the most commonly used types.
//!
//! # Example
//!
//! ```
//! use weft_core::prelude::*;
//! ```

// Core types
pub use crate::types::{EdgeId, Epoch, NodeId, RunId, TokenId};

// Error handling
pub use crate::error::{Result, WeftError};

// Payloads
pub use crate::envelope::Envelope;

// Diagram entities
pub use crate::diagram::{
    CompiledNode, ConcurrencyPolicy, ConnectionDescription, DiagramDescription, Edge,
    EdgeAttrs, ExecutableDiagram, JoinPolicy, NodeDescription, NodeType,
};

// Compiler
pub use crate::compile::{
    CompileMode, CompilePhase, Compiler, Diagnostic, Severity, TransformRule, TransformTable,
};
