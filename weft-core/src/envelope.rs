//! Opaque payload wrapper.
//!
//! The engine stores, clones, and forwards envelopes without inspecting
//! their contents; typed extraction is a handler concern. Cloning is cheap
//! (reference-counted), so a payload fanned out to many edges is shared,
//! never copied.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// An opaque unit of data flowing along edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    value: Arc<Value>,
}

impl Envelope {
    /// Wrap a JSON value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            value: Arc::new(value),
        }
    }

    /// The null envelope. Emitting a null payload on a port skips the port.
    #[must_use]
    pub fn null() -> Self {
        Self::new(Value::Null)
    }

    /// Borrow the wrapped value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Whether the wrapped value is JSON null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::null()
    }
}

impl From<Value> for Envelope {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl Serialize for Envelope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::new)
    }
}
