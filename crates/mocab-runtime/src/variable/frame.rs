//! Per-call value frame

use super::registry::LeafId;
use mocab_core::Value;

static NULL: Value = Value::Null;

/// Current values of a registry's numeric leaves for one resolution.
///
/// The registry template is shared and immutable; each call owns its frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFrame {
    values: Vec<Value>,
}

impl ValueFrame {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            values: vec![Value::Null; len],
        }
    }

    pub fn get(&self, leaf: LeafId) -> &Value {
        self.values.get(leaf.index()).unwrap_or(&NULL)
    }

    /// Publish a leaf value; every variable reading the leaf observes it
    pub fn set(&mut self, leaf: LeafId, value: Value) {
        if let Some(slot) = self.values.get_mut(leaf.index()) {
            *slot = value.normalized();
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
