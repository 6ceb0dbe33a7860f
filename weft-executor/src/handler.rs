//! Handler abstractions.
//!
//! A handler is the user-supplied logic behind a node type. The engine
//! resolves handlers through a [`HandlerRegistry`] at spawn time and never
//! inspects payloads itself; everything a handler sees or returns is an
//! opaque [`Envelope`] keyed by port name.
//!
//! Futures are boxed rather than going through an async-trait layer, which
//! keeps the trait object-safe and the dispatch cost explicit.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use weft_core::diagram::NodeType;
use weft_core::envelope::Envelope;
use weft_core::error::Result;
use weft_core::types::{Epoch, NodeId, RunId};

/// Per-invocation context handed to a handler.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// The run this invocation belongs to.
    pub run_id: RunId,
    /// The node being executed.
    pub node_id: NodeId,
    /// Author-facing node name.
    pub node_name: String,
    /// The epoch the inputs were consumed in.
    pub epoch: Epoch,
    /// Cooperative cancellation for the whole run.
    pub cancel: CancellationToken,
}

/// Port-keyed handler outputs. An absent port did not fire.
pub type HandlerOutputs = HashMap<String, Envelope>;

/// Boxed future returned by a handler invocation.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<HandlerOutputs>> + Send + 'a>>;

/// User-supplied logic behind a node type.
pub trait Handler: Send + Sync {
    /// Execute against the consumed inputs.
    ///
    /// `config` is the node's compiled configuration object. Returning an
    /// `Err` routes to the node's `error` port when an outgoing error
    /// edge exists; otherwise the node is marked failed.
    fn execute<'a>(
        &'a self,
        ctx: RunContext,
        inputs: HashMap<String, Envelope>,
        config: &'a serde_json::Value,
    ) -> HandlerFuture<'a>;
}

/// Resolves the handler for a node type.
pub trait HandlerRegistry: Send + Sync {
    /// Look up the handler for a node type, if one is registered.
    fn handler_for(&self, node_type: NodeType) -> Option<Arc<dyn Handler>>;
}

/// Map-backed [`HandlerRegistry`].
#[derive(Default)]
pub struct MapRegistry {
    handlers: HashMap<NodeType, Arc<dyn Handler>>,
}

impl MapRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a node type, replacing any previous one.
    pub fn register(&mut self, node_type: NodeType, handler: Arc<dyn Handler>) {
        self.handlers.insert(node_type, handler);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, node_type: NodeType, handler: Arc<dyn Handler>) -> Self {
        self.register(node_type, handler);
        self
    }
}

impl HandlerRegistry for MapRegistry {
    fn handler_for(&self, node_type: NodeType) -> Option<Arc<dyn Handler>> {
        self.handlers.get(&node_type).cloned()
    }
}

impl std::fmt::Debug for MapRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapRegistry")
            .field("types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Handler for Echo {
        fn execute<'a>(
            &'a self,
            _ctx: RunContext,
            inputs: HashMap<String, Envelope>,
            _config: &'a serde_json::Value,
        ) -> HandlerFuture<'a> {
            Box::pin(async move {
                let mut outputs = HandlerOutputs::new();
                if let Some(input) = inputs.get("in") {
                    outputs.insert("out".to_string(), input.clone());
                }
                Ok(outputs)
            })
        }
    }

    #[test]
    fn registry_resolves_by_type() {
        let registry = MapRegistry::new().with(NodeType::Task, Arc::new(Echo));
        assert!(registry.handler_for(NodeType::Task).is_some());
        assert!(registry.handler_for(NodeType::Merge).is_none());
    }
}
