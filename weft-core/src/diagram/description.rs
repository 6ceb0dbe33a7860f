//! Raw diagram descriptions.
//!
//! A description is the compiler's sole input: a loosely-validated,
//! pre-parsed graph produced by an external authoring surface. The core
//! never parses file formats; descriptions arrive as deserialized values.
//!
//! Nodes are listed in author order, which makes compiler-assigned IDs
//! deterministic across compilations of the same description.

use super::policy::{ConcurrencyPolicy, JoinPolicy};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A complete raw diagram description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagramDescription {
    /// Diagram name.
    pub name: String,

    /// Optional version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Nodes, in author order.
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,

    /// Data-carrying connections between node ports.
    #[serde(default)]
    pub connections: Vec<ConnectionDescription>,
}

impl DiagramDescription {
    /// Create an empty description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Add a node (builder style).
    pub fn node(mut self, node: NodeDescription) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add a connection from `from` to `to`, each in `node` or `node.port`
    /// form (builder style).
    pub fn connect(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.connections.push(ConnectionDescription::new(from, to));
        self
    }

    /// Add a prepared connection (builder style).
    pub fn connection(mut self, connection: ConnectionDescription) -> Self {
        self.connections.push(connection);
        self
    }

    /// Look up a node description by name.
    #[must_use]
    pub fn find_node(&self, name: &str) -> Option<&NodeDescription> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// A raw node description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescription {
    /// Unique node name.
    pub name: String,

    /// Type tag (e.g. "start", "task", "condition").
    #[serde(rename = "type")]
    pub type_tag: String,

    /// Opaque type-specific configuration.
    #[serde(default)]
    pub config: Map<String, Value>,

    /// Declared input ports; defaults derive from the node type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<String>>,

    /// Declared output ports; defaults derive from the node type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<String>>,

    /// Explicit join policy override. Absent means compiler default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinPolicy>,

    /// Explicit concurrency policy override. Absent means compiler default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<ConcurrencyPolicy>,

    /// Maximum total executions across all epochs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_executions: Option<u32>,

    /// Disabled nodes are dropped during transformation.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl NodeDescription {
    /// Create a node description with an empty config.
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            config: Map::new(),
            inputs: None,
            outputs: None,
            join: None,
            concurrency: None,
            max_executions: None,
            enabled: true,
        }
    }

    /// Set a config field (builder style).
    pub fn config_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Override the declared input ports (builder style).
    pub fn with_inputs<I: Into<String>>(mut self, inputs: impl IntoIterator<Item = I>) -> Self {
        self.inputs = Some(inputs.into_iter().map(Into::into).collect());
        self
    }

    /// Override the declared output ports (builder style).
    pub fn with_outputs<I: Into<String>>(mut self, outputs: impl IntoIterator<Item = I>) -> Self {
        self.outputs = Some(outputs.into_iter().map(Into::into).collect());
        self
    }

    /// Set an explicit join policy (builder style).
    pub fn with_join(mut self, join: JoinPolicy) -> Self {
        self.join = Some(join);
        self
    }

    /// Set an explicit concurrency policy (builder style).
    pub fn with_concurrency(mut self, concurrency: ConcurrencyPolicy) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Set the execution budget (builder style).
    pub fn with_max_executions(mut self, max: u32) -> Self {
        self.max_executions = Some(max);
        self
    }

    /// Disable the node (builder style).
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A raw connection between two node ports.
///
/// Endpoints are `node` or `node.port` strings; an unspecified port resolves
/// to the conventional default (`out` on the source, `in` on the target).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDescription {
    /// Source endpoint.
    pub from: String,

    /// Target endpoint.
    pub to: String,

    /// Connection-level data-transform override, merged over the type-pair
    /// default key-by-key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub transform: BTreeMap<String, Value>,

    /// Whether the target's readiness may ignore this edge when it holds no
    /// token and another qualifying edge remains.
    #[serde(default)]
    pub skippable: bool,
}

impl ConnectionDescription {
    /// Create a connection.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            transform: BTreeMap::new(),
            skippable: false,
        }
    }

    /// Mark the connection skippable (builder style).
    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self
    }

    /// Set a transform override key (builder style).
    pub fn transform_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.transform.insert(key.into(), value);
        self
    }

    /// The node part of the source endpoint.
    #[must_use]
    pub fn from_node(&self) -> &str {
        split_endpoint(&self.from).0
    }

    /// The explicit port part of the source endpoint, if any.
    #[must_use]
    pub fn from_port(&self) -> Option<&str> {
        split_endpoint(&self.from).1
    }

    /// The node part of the target endpoint.
    #[must_use]
    pub fn to_node(&self) -> &str {
        split_endpoint(&self.to).0
    }

    /// The explicit port part of the target endpoint, if any.
    #[must_use]
    pub fn to_port(&self) -> Option<&str> {
        split_endpoint(&self.to).1
    }
}

fn split_endpoint(endpoint: &str) -> (&str, Option<&str>) {
    match endpoint.split_once('.') {
        Some((node, port)) if !port.is_empty() => (node, Some(port)),
        Some((node, _)) => (node, None),
        None => (endpoint, None),
    }
}
