//! Token bookkeeping.
//!
//! Every payload moving along an edge is a token with a stable identity:
//! the edge it rides, the epoch it belongs to, and a per-(edge, epoch)
//! sequence number assigned densely from 1. Consumption is tracked with
//! per-(node, edge, epoch) cursors, so a node consumes each edge's stream
//! at most once per readiness and never observes a token twice.
//!
//! All maps live behind one coarse `parking_lot::Mutex`; publish and
//! consume are single-acquisition operations, so writers never observe a
//! half-applied claim.

use crate::snapshot::TokenSnapshot;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use weft_core::diagram::{ExecutableDiagram, JoinPolicy};
use weft_core::envelope::Envelope;
use weft_core::error::{Result, WeftError};
use weft_core::types::{EdgeId, Epoch, NodeId, TokenId};

/// Metadata key recording the branch port that routed a token here.
pub const META_DECISION: &str = "decision";
/// Metadata key recording the originating node of a merge input.
pub const META_SOURCE: &str = "source";

/// An immutable payload instance on one edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Unique token ID.
    pub id: TokenId,
    /// The edge the token rides.
    pub edge: EdgeId,
    /// The epoch the token belongs to.
    pub epoch: Epoch,
    /// Dense per-(edge, epoch) sequence, starting at 1.
    pub seq: u64,
    /// The payload.
    pub payload: Envelope,
    /// Publication time, nanoseconds since the Unix epoch.
    pub timestamp_ns: u64,
    /// Engine-attached metadata (branch decision, merge source tag).
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Default)]
struct TokenState {
    epoch: Epoch,
    /// Highest assigned sequence per (edge, epoch).
    seq: HashMap<(EdgeId, Epoch), u64>,
    /// Published tokens by full identity.
    store: HashMap<(EdgeId, Epoch, u64), Arc<Token>>,
    /// Consumption cursor per (consumer, edge, epoch).
    cursor: HashMap<(NodeId, EdgeId, Epoch), u64>,
    /// Most recent branch decision per branching node.
    branch: HashMap<NodeId, (Epoch, String)>,
}

/// Owns all token state for one run.
pub struct TokenManager {
    diagram: Arc<ExecutableDiagram>,
    state: Mutex<TokenState>,
}

impl TokenManager {
    /// Create a manager for a compiled diagram, starting at epoch 0.
    #[must_use]
    pub fn new(diagram: Arc<ExecutableDiagram>) -> Self {
        Self {
            diagram,
            state: Mutex::new(TokenState::default()),
        }
    }

    /// The run's current epoch.
    #[must_use]
    pub fn current_epoch(&self) -> Epoch {
        self.state.lock().epoch
    }

    /// Advance to the next epoch and return it.
    pub fn begin_epoch(&self) -> Epoch {
        let mut state = self.state.lock();
        state.epoch = state.epoch.next();
        state.epoch
    }

    /// Publish a payload on an edge within an epoch.
    ///
    /// Sequences per (edge, epoch) start at 1 and never skip.
    ///
    /// # Errors
    ///
    /// Returns [`WeftError::UnknownEdge`] for an edge outside the diagram.
    pub fn publish_token(
        &self,
        edge: EdgeId,
        payload: Envelope,
        epoch: Epoch,
    ) -> Result<Arc<Token>> {
        self.publish_with_metadata(edge, payload, epoch, BTreeMap::new())
    }

    fn publish_with_metadata(
        &self,
        edge: EdgeId,
        payload: Envelope,
        epoch: Epoch,
        metadata: BTreeMap<String, Value>,
    ) -> Result<Arc<Token>> {
        if self.diagram.edge(edge).is_none() {
            return Err(WeftError::UnknownEdge { edge });
        }
        let mut state = self.state.lock();
        let seq = state.seq.entry((edge, epoch)).or_insert(0);
        *seq += 1;
        let seq = *seq;
        let token = Arc::new(Token {
            id: TokenId::new(),
            edge,
            epoch,
            seq,
            payload,
            timestamp_ns: now_ns(),
            metadata,
        });
        state.store.insert((edge, epoch, seq), Arc::clone(&token));
        tracing::trace!(%edge, %epoch, seq, "token published");
        Ok(token)
    }

    /// Publish a node's outputs onto its outgoing edges.
    ///
    /// Each outgoing edge whose source port has a non-null entry gets one
    /// token; absent and null ports fire nothing. Tokens riding loop-back
    /// edges land in the next epoch. A branching node records its single
    /// fired port as the branch decision for this epoch.
    ///
    /// # Errors
    ///
    /// Returns [`WeftError::UnknownNode`] for a node outside the diagram
    /// and [`WeftError::BranchConflict`] when a branching node fires more
    /// than one output port.
    pub fn emit_outputs(
        &self,
        node: NodeId,
        outputs: &HashMap<String, Envelope>,
        epoch: Epoch,
    ) -> Result<Vec<Arc<Token>>> {
        let compiled = self
            .diagram
            .node(node)
            .ok_or(WeftError::UnknownNode { node })?;

        let mut fired: Vec<&str> = compiled
            .outputs
            .iter()
            .filter(|port| outputs.get(*port).is_some_and(|env| !env.is_null()))
            .map(String::as_str)
            .collect();
        fired.sort_unstable();

        if compiled.node_type.is_branching() {
            match fired.as_slice() {
                [] => {}
                [port] => {
                    self.state
                        .lock()
                        .branch
                        .insert(node, (epoch, (*port).to_string()));
                }
                ports => {
                    return Err(WeftError::BranchConflict {
                        node,
                        ports: ports.iter().map(ToString::to_string).collect(),
                        epoch,
                    });
                }
            }
        }

        let mut published = Vec::new();
        let edges: Vec<(EdgeId, String)> = self
            .diagram
            .outgoing_edges(node)
            .map(|(id, edge)| (id, edge.from_port.clone()))
            .collect();
        for (edge_id, from_port) in edges {
            let Some(payload) = outputs.get(&from_port) else {
                continue;
            };
            if payload.is_null() {
                continue;
            }
            let attrs = self
                .diagram
                .edge_attrs(edge_id)
                .ok_or(WeftError::UnknownEdge { edge: edge_id
                })?;

            let mut metadata = BTreeMap::new();
            if attrs
                .transform
                .get("carry_decision")
                .is_some_and(|v| v == &Value::Bool(true))
            {
                metadata.insert(META_DECISION.to_string(), Value::String(from_port.clone()));
            }
            if attrs
                .transform
                .get("tag_source")
                .is_some_and(|v| v == &Value::Bool(true))
            {
                metadata.insert(
                    META_SOURCE.to_string(),
                    Value::String(compiled.name.clone()),
                );
            }

            let target_epoch = if attrs.loop_back { epoch.next() } else { epoch };
            published.push(self.publish_with_metadata(
                edge_id,
                payload.clone(),
                target_epoch,
                metadata,
            )?);
        }
        Ok(published)
    }

    /// Atomically claim the latest unconsumed token on every incoming edge
    /// holding one, keyed by input port.
    ///
    /// Cursors advance under the same lock acquisition, so a concurrent
    /// claim for the same node observes either all advances or none. A node
    /// with no incoming edges yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`WeftError::CursorRegression`] when a cursor sits past the
    /// published sequence and [`WeftError::PartialConsumption`] when the
    /// sequence and store maps disagree. Both are engine invariants.
    pub fn consume_inbound(
        &self,
        node: NodeId,
        epoch: Epoch,
    ) -> Result<HashMap<String, Envelope>> {
        let edges: Vec<(EdgeId, String)> = self
            .diagram
            .incoming_edges(node)
            .map(|(id, edge)| (id, edge.to_port.clone()))
            .collect();

        let mut state = self.state.lock();
        let mut claims: Vec<(EdgeId, String, u64)> = Vec::new();
        for (edge_id, to_port) in edges {
            let latest = state.seq.get(&(edge_id, epoch)).copied().unwrap_or(0);
            let cursor = state
                .cursor
                .get(&(node, edge_id, epoch))
                .copied()
                .unwrap_or(0);
            if cursor > latest {
                return Err(WeftError::CursorRegression {
                    node,
                    edge: edge_id,
                    epoch,
                });
            }
            if latest > cursor {
                claims.push((edge_id, to_port, latest));
            }
        }

        let mut inputs = HashMap::with_capacity(claims.len());
        for (edge_id, to_port, latest) in &claims {
            let Some(token) = state.store.get(&(*edge_id, epoch, *latest)) else {
                // Sequence says published, store disagrees: the claim
                // cannot be completed coherently.
                return Err(WeftError::PartialConsumption { node, epoch });
            };
            inputs.insert(to_port.clone(), token.payload.clone());
        }
        for (edge_id, _, latest) in claims {
            state.cursor.insert((node, edge_id, epoch), latest);
        }
        Ok(inputs)
    }

    /// Whether a node's inbound edges satisfy its join policy at an epoch.
    ///
    /// An inbound edge qualifies unless its source is a branching node whose
    /// recorded decision this epoch selected a different port. A skippable
    /// edge holding no token drops out of the required set, but only while
    /// at least one qualifying edge remains; the skip never chains across
    /// hops.
    #[must_use]
    pub fn has_new_inputs(&self, node: NodeId, epoch: Epoch, join: JoinPolicy) -> bool {
        let state = self.state.lock();

        let mut inbound = 0usize;
        let mut required = 0usize;
        let mut available = 0usize;
        for (edge_id, edge) in self.diagram.incoming_edges(node) {
            inbound += 1;
            if let Some(source) = self.diagram.node(edge.from_node) {
                if source.node_type.is_branching() {
                    if let Some((decided_epoch, port)) = state.branch.get(&edge.from_node) {
                        if *decided_epoch == epoch && *port != edge.from_port {
                            continue;
                        }
                    }
                }
            }

            let latest = state.seq.get(&(edge_id, epoch)).copied().unwrap_or(0);
            let cursor = state
                .cursor
                .get(&(node, edge_id, epoch))
                .copied()
                .unwrap_or(0);
            let has_token = latest > cursor;

            let skippable = self
                .diagram
                .edge_attrs(edge_id)
                .is_some_and(|a| a.skippable);
            if !has_token && skippable {
                continue;
            }
            required += 1;
            if has_token {
                available += 1;
            }
        }

        // Trivial satisfaction is reserved for nodes with no inbound edges
        // at all (the start node). A node whose edges were all disqualified
        // or skipped away has nothing to run on.
        if inbound > 0 && required == 0 {
            return false;
        }
        join.satisfied(available, required)
    }

    /// The most recent branch decision of a node, regardless of epoch.
    #[must_use]
    pub fn get_branch_decision(&self, node: NodeId) -> Option<String> {
        self.state
            .lock()
            .branch
            .get(&node)
            .map(|(_, port)| port.clone())
    }

    /// Whether any edge still holds a token its consumer has not claimed
    /// at the given epoch.
    #[must_use]
    pub fn any_unconsumed(&self, epoch: Epoch) -> bool {
        let state = self.state.lock();
        state.seq.iter().any(|(&(edge_id, e), &latest)| {
            if e != epoch || latest == 0 {
                return false;
            }
            let Some(edge) = self.diagram.edge(edge_id) else {
                return false;
            };
            let cursor = state
                .cursor
                .get(&(edge.to_node, edge_id, epoch))
                .copied()
                .unwrap_or(0);
            latest > cursor
        })
    }

    /// Copy all maps into a serializable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> TokenSnapshot {
        let state = self.state.lock();
        TokenSnapshot {
            epoch: state.epoch,
            seq: state
                .seq
                .iter()
                .map(|(&(edge, epoch), &seq)| (edge, epoch, seq))
                .collect(),
            tokens: state.store.values().map(|token| (**token).clone()).collect(),
            cursors: state
                .cursor
                .iter()
                .map(|(&(node, edge, epoch), &seq)| (node, edge, epoch, seq))
                .collect(),
            branches: state
                .branch
                .iter()
                .map(|(&node, (epoch, port))| (node, *epoch, port.clone()))
                .collect(),
        }
    }

    /// Replace all state with a snapshot's contents.
    pub fn restore(&self, snapshot: TokenSnapshot) {
        let mut state = self.state.lock();
        state.epoch = snapshot.epoch;
        state.seq = snapshot
            .seq
            .into_iter()
            .map(|(edge, epoch, seq)| ((edge, epoch), seq))
            .collect();
        state.store = snapshot
            .tokens
            .into_iter()
            .map(|token| ((token.edge, token.epoch, token.seq), Arc::new(token)))
            .collect();
        state.cursor = snapshot
            .cursors
            .into_iter()
            .map(|(node, edge, epoch, seq)| ((node, edge, epoch), seq))
            .collect();
        state.branch = snapshot
            .branches
            .into_iter()
            .map(|(node, epoch, port)| (node, (epoch, port)))
            .collect();
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TokenManager")
            .field("diagram", &self.diagram.name())
            .field("epoch", &state.epoch)
            .field("tokens", &state.store.len())
            .finish()
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
