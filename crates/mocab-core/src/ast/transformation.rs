//! Transformation table definitions
//!
//! Each row of the transformation table declares one variable of a model:
//! a numeric leaf bound to a feature, a category rule over other variables or
//! a formula. Rows with an index fill a slot of the model input (or label)
//! vector; rows without one are named dependencies of later rows.

use super::expression::Expression;
use crate::condition::CategoryRule;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Row type of the transformation table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Numeric,
    Category,
    Formula,
}

impl FromStr for VariableType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numeric" => Ok(VariableType::Numeric),
            "category" => Ok(VariableType::Category),
            "formula" | "formulate" => Ok(VariableType::Formula),
            other => Err(CoreError::InvalidValue(format!(
                "unknown variable type '{}'",
                other
            ))),
        }
    }
}

/// Output table a slot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SlotRole {
    /// Model input vector
    #[default]
    Input,
    /// Training target columns
    Label,
}

impl FromStr for SlotRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "input" => Ok(SlotRole::Input),
            "label" | "target" => Ok(SlotRole::Label),
            other => Err(CoreError::InvalidValue(format!("unknown role '{}'", other))),
        }
    }
}

/// Parsed variable declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VariableSpec {
    /// Leaf observing the row's feature
    Numeric,
    /// `LABEL=cond&cond…`
    Category(CategoryRule),
    /// Compiled formula over named variables
    Formula {
        expression: Expression,
        /// Evaluation failure aborts resolution instead of yielding null
        #[serde(default)]
        mandatory: bool,
    },
}

impl VariableSpec {
    pub fn variable_type(&self) -> VariableType {
        match self {
            VariableSpec::Numeric => VariableType::Numeric,
            VariableSpec::Category(_) => VariableType::Category,
            VariableSpec::Formula { .. } => VariableType::Formula,
        }
    }
}

/// One row of the transformation table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationRow {
    /// Feature (or derived variable) name
    pub feature: String,
    pub spec: VariableSpec,
    /// 1-based output slot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default)]
    pub role: SlotRole,
}

impl TransformationRow {
    pub fn new(feature: impl Into<String>, spec: VariableSpec) -> Self {
        Self {
            feature: feature.into(),
            spec,
            index: None,
            role: SlotRole::Input,
        }
    }

    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_role(mut self, role: SlotRole) -> Self {
        self.role = role;
        self
    }
}

/// Rows of one model, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTransformation {
    pub model: String,
    pub rows: Vec<TransformationRow>,
}

impl ModelTransformation {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            rows: Vec::new(),
        }
    }
}

/// Transformation table: model name to its rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformationTable {
    models: HashMap<String, ModelTransformation>,
}

impl TransformationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: ModelTransformation) {
        self.models.insert(model.model.clone(), model);
    }

    pub fn model(&self, model: &str) -> Option<&ModelTransformation> {
        self.models.get(model)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelTransformation> {
        self.models.values()
    }

    /// Model names, sorted
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
