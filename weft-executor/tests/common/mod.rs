//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use weft_core::compile::Compiler;
use weft_core::diagram::{DiagramDescription, ExecutableDiagram};
use weft_executor::scheduler::SchedulerConfig;

/// Compile a description, panicking on diagnostics.
pub fn compile(desc: &DiagramDescription) -> Arc<ExecutableDiagram> {
    Arc::new(
        Compiler::new()
            .compile(desc)
            .expect("test diagram should compile"),
    )
}

/// A minimal non-null run seed. A null seed fires no start output.
pub fn seed() -> serde_json::Value {
    serde_json::json!({"seed": true})
}

/// A scheduler config with short timeouts for testing.
pub fn test_scheduler_config() -> SchedulerConfig {
    SchedulerConfig::default()
        .with_max_concurrent_runs(10)
        .with_node_timeout_ms(2_000)
        .with_max_epochs(16)
}
