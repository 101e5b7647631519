//! Feature catalog definitions
//!
//! A feature is one named clinical signal a model depends on. The catalog maps
//! each model to its ordered feature definitions.

use crate::error::CoreError;
use crate::types::{TimeWindow, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Source code of a feature, optionally qualified by its coding system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeRef {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl CodeRef {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            system: None,
        }
    }

    pub fn with_system(code: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            system: Some(system.into()),
        }
    }

    /// Match an observation code. A code without a system matches any system.
    pub fn matches(&self, code: &str, system: Option<&str>) -> bool {
        if self.code != code {
            return false;
        }
        match (&self.system, system) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => true,
        }
    }
}

impl fmt::Display for CodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.system {
            Some(system) => write!(f, "{}|{}", system, self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

/// Value kind of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    /// Numeric or free-form measured value
    Value,
    /// Presence category: the feature is true when any observation exists
    Category,
}

impl FromStr for DataKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "value" | "numeric" | "observation" | "laboratory" | "patient" => Ok(DataKind::Value),
            "category" | "condition" | "diagnosis" => Ok(DataKind::Category),
            other => Err(CoreError::InvalidValue(format!(
                "unknown type_of_data '{}'",
                other
            ))),
        }
    }
}

/// Reduction applied to a feature's filtered series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Most recent observation
    #[default]
    Latest,
    /// Oldest observation
    Earliest,
    /// Largest value
    Max,
    /// Smallest value
    Min,
    /// Arithmetic mean of numeric values
    Mean,
    /// Full series
    All,
}

impl SearchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStrategy::Latest => "latest",
            SearchStrategy::Earliest => "earliest",
            SearchStrategy::Max => "max",
            SearchStrategy::Min => "min",
            SearchStrategy::Mean => "mean",
            SearchStrategy::All => "all",
        }
    }
}

impl FromStr for SearchStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "latest" => Ok(SearchStrategy::Latest),
            "earliest" => Ok(SearchStrategy::Earliest),
            "max" => Ok(SearchStrategy::Max),
            "min" => Ok(SearchStrategy::Min),
            "mean" => Ok(SearchStrategy::Mean),
            "all" => Ok(SearchStrategy::All),
            other => Err(CoreError::InvalidValue(format!(
                "unknown search_type '{}'",
                other
            ))),
        }
    }
}

/// Catalog entry for one feature of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDefinition {
    /// Feature name, unique within a model
    pub name: String,

    /// Source codes, in declaration order
    pub codes: Vec<CodeRef>,

    pub kind: DataKind,

    /// Maximum age of a usable observation
    pub window: TimeWindow,

    /// Value used when no observation survives
    #[serde(default)]
    pub default_value: Value,

    #[serde(default)]
    pub search: SearchStrategy,

    /// A single observation bypasses data filters
    #[serde(default)]
    pub snapshot: bool,
}

impl FeatureDefinition {
    pub fn new(name: impl Into<String>, kind: DataKind, window: TimeWindow) -> Self {
        Self {
            name: name.into(),
            codes: Vec::new(),
            kind,
            window,
            default_value: Value::Null,
            search: SearchStrategy::default(),
            snapshot: false,
        }
    }

    pub fn with_code(mut self, code: CodeRef) -> Self {
        self.codes.push(code);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = value;
        self
    }

    pub fn with_search(mut self, search: SearchStrategy) -> Self {
        self.search = search;
        self
    }

    pub fn with_snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Whether an observation code belongs to this feature
    pub fn matches_code(&self, code: &str, system: Option<&str>) -> bool {
        self.codes.iter().any(|c| c.matches(code, system))
    }
}

/// Ordered features of one model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelFeatures {
    pub model: String,
    pub features: Vec<FeatureDefinition>,
}

impl ModelFeatures {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            features: Vec::new(),
        }
    }

    /// Look up a feature by name
    pub fn get(&self, name: &str) -> Option<&FeatureDefinition> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FeatureDefinition> {
        self.features.iter_mut().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureDefinition> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Feature catalog: model name to its features
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCatalog {
    models: HashMap<String, ModelFeatures>,
}

impl FeatureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, features: ModelFeatures) {
        self.models.insert(features.model.clone(), features);
    }

    /// Features of a model, `None` when the model is unknown
    pub fn model(&self, model: &str) -> Option<&ModelFeatures> {
        self.models.get(model)
    }

    pub fn model_mut(&mut self, model: &str) -> Option<&mut ModelFeatures> {
        self.models.get_mut(model)
    }

    pub fn contains_model(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    /// Model names, sorted
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Merge another catalog into this one. Features of a model already present
    /// are appended unless a feature of the same name exists.
    pub fn merge(&mut self, other: FeatureCatalog) {
        for (model, incoming) in other.models {
            let entry = self
                .models
                .entry(model.clone())
                .or_insert_with(|| ModelFeatures::new(model));
            for feature in incoming.features {
                if entry.get(&feature.name).is_none() {
                    entry.features.push(feature);
                }
            }
        }
    }
}
