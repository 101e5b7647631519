//! Variable graph
//!
//! One [`VariableRegistry`] per model, built once at startup and shared
//! read-only. Resolution happens against a per-call [`ValueFrame`].

pub mod frame;
pub mod registry;

pub use frame::ValueFrame;
pub use registry::{Binding, BoundCondition, LeafId, Slot, Variable, VariableId, VariableRegistry};

use crate::error::{Result, RuntimeError};
use mocab_core::ast::TransformationTable;
use std::collections::HashMap;
use std::sync::Arc;

/// Registries of every configured model
#[derive(Debug, Clone, Default)]
pub struct VariableGraph {
    registries: HashMap<String, Arc<VariableRegistry>>,
}

impl VariableGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry for every model of the transformation table
    pub fn build(table: &TransformationTable) -> Self {
        let registries = table
            .models()
            .map(|model| (model.model.clone(), Arc::new(VariableRegistry::build(model))))
            .collect();
        Self { registries }
    }

    pub fn insert(&mut self, registry: VariableRegistry) {
        self.registries
            .insert(registry.model().to_string(), Arc::new(registry));
    }

    /// Registry of a model
    pub fn model(&self, name: &str) -> Result<Arc<VariableRegistry>> {
        self.registries
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::ModelNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registries.contains_key(name)
    }

    /// Model names, sorted
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.registries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocab_core::ast::{ModelTransformation, TransformationRow, VariableSpec};

    #[test]
    fn test_unknown_model_is_distinct_error() {
        let mut table = TransformationTable::new();
        let mut model = ModelTransformation::new("nsti");
        model.rows.push(TransformationRow::new("wbc", VariableSpec::Numeric).at(1));
        table.insert(model);

        let graph = VariableGraph::build(&table);
        assert!(graph.model("nsti").is_ok());
        assert!(matches!(graph.model("charm"), Err(RuntimeError::ModelNotFound(name)) if name == "charm"));
        assert_eq!(graph.model_names(), vec!["nsti"]);
    }
}
