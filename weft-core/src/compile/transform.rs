//! Phase 2: raw node descriptions become compiled node entities.
//!
//! The mapping is data-driven: a statically registered table keyed by node
//! type describes field renames on ingest, default-value injection for
//! absent optional fields, field removals, and an optional custom hook.
//! The table is resolved when the compiler is constructed, never by
//! reflection on node configs.

use super::context::{Context, PolicyOverrides};
use super::diagnostics::{CompilePhase, Diagnostic};
use crate::diagram::{
    CompiledNode, ConcurrencyPolicy, JoinPolicy, NodeType, DEFAULT_MAX_EXECUTIONS,
};
use crate::types::NodeId;
use serde_json::{Map, Value};
use std::collections::HashMap;

const PHASE: CompilePhase = CompilePhase::Transformation;

/// A custom per-type transform applied after renames, defaults, and
/// removals. Returns a message on failure.
pub type TransformHook = fn(&mut Map<String, Value>) -> Result<(), String>;

/// Ingest transformation for one node type.
#[derive(Debug, Clone, Default)]
pub struct TransformRule {
    /// `(old, new)` key renames, applied when `old` is present.
    pub renames: Vec<(String, String)>,
    /// Default values injected for absent keys.
    pub defaults: Vec<(String, Value)>,
    /// Keys removed after renames and defaults.
    pub removals: Vec<String>,
    /// Optional custom hook.
    pub hook: Option<TransformHook>,
}

impl TransformRule {
    fn apply(&self, config: &mut Map<String, Value>) -> Result<(), String> {
        for (old, new) in &self.renames {
            if let Some(value) = config.remove(old) {
                config.insert(new.clone(), value);
            }
        }
        for (key, default) in &self.defaults {
            if !config.contains_key(key) {
                config.insert(key.clone(), default.clone());
            }
        }
        for key in &self.removals {
            config.remove(key);
        }
        if let Some(hook) = self.hook {
            hook(config)?;
        }
        Ok(())
    }
}

/// Node-type-keyed transform table.
#[derive(Debug, Clone, Default)]
pub struct TransformTable {
    rules: HashMap<NodeType, TransformRule>,
}

impl TransformTable {
    /// An empty table (no transformation beyond entity construction).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard table.
    ///
    /// Renames accept the legacy authoring field names still emitted by
    /// older editors; defaults fill the fields handlers may rely on.
    #[must_use]
    pub fn standard() -> Self {
        let mut table = Self::default();
        table.register(
            NodeType::Start,
            TransformRule {
                // Trigger wiring is an authoring-surface concern.
                removals: vec!["trigger".to_string()],
                ..TransformRule::default()
            },
        );
        table.register(
            NodeType::Condition,
            TransformRule {
                renames: vec![("if".to_string(), "predicate".to_string())],
                defaults: vec![("predicate".to_string(), Value::Bool(true))],
                ..TransformRule::default()
            },
        );
        table.register(
            NodeType::Loop,
            TransformRule {
                renames: vec![("iterations".to_string(), "max_iterations".to_string())],
                defaults: vec![(
                    "max_iterations".to_string(),
                    Value::Number(serde_json::Number::from(4)),
                )],
                ..TransformRule::default()
            },
        );
        table
    }

    /// Register (or replace) the rule for a node type.
    pub fn register(&mut self, node_type: NodeType, rule: TransformRule) {
        self.rules.insert(node_type, rule);
    }

    fn rule(&self, node_type: NodeType) -> Option<&TransformRule> {
        self.rules.get(&node_type)
    }
}

pub(super) fn run(ctx: &mut Context<'_>, table: &TransformTable) {
    let mut diagnostics = Vec::new();

    for desc in &ctx.desc.nodes {
        if !desc.enabled {
            continue;
        }
        // Validation already diagnosed unknown tags; skip them here so the
        // diagnostics mode can keep going.
        let Some(node_type) = NodeType::parse(&desc.type_tag) else {
            continue;
        };
        if ctx.names.contains_key(&desc.name) {
            // Duplicate name, first occurrence wins.
            continue;
        }

        let mut config = desc.config.clone();
        if let Some(rule) = table.rule(node_type) {
            if let Err(message) = rule.apply(&mut config) {
                diagnostics.push(
                    Diagnostic::error(PHASE, format!("transform hook failed: {message}"))
                        .with_node(&desc.name),
                );
                continue;
            }
        }

        let id = NodeId::new(ctx.nodes.len() as u32);
        ctx.names.insert(desc.name.clone(), id);
        ctx.overrides.insert(
            id,
            PolicyOverrides {
                join: desc.join,
                concurrency: desc.concurrency,
            },
        );
        ctx.nodes.push(CompiledNode {
            id,
            name: desc.name.clone(),
            node_type,
            config: Value::Object(config),
            inputs: desc
                .inputs
                .clone()
                .unwrap_or_else(|| node_type.default_inputs()),
            outputs: desc
                .outputs
                .clone()
                .unwrap_or_else(|| node_type.default_outputs()),
            // Placeholders; assembly resolves the real policies.
            join: JoinPolicy::All,
            concurrency: ConcurrencyPolicy::Singleton,
            max_executions: desc.max_executions.unwrap_or(DEFAULT_MAX_EXECUTIONS),
        });
    }

    ctx.diagnostics.extend(diagnostics);
}
