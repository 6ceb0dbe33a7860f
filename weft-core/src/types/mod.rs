//! Core type definitions.

mod ids;

pub use ids::{Epoch, EdgeId, NodeId, RunId, TokenId};
