//! Training set definitions
//!
//! One training set exists per trainable model: the data filter applied to
//! every feature series, the training duration, the null-value strategy used
//! to clean the assembled matrix and the remaining hyperparameters.

use super::operator::Comparator;
use crate::types::{TimeWindow, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which half of a (date, value) entry a filter rule inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Date,
    #[default]
    Value,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKind::Date => write!(f, "date"),
            FilterKind::Value => write!(f, "value"),
        }
    }
}

/// Threshold of a filter rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterThreshold {
    /// Literal threshold, never the missing marker
    Literal(Value),
    /// Resolved value (or date) of another feature, written `[feature]`
    Reference(String),
}

impl FilterThreshold {
    pub fn reference(&self) -> Option<&str> {
        match self {
            FilterThreshold::Reference(name) => Some(name),
            FilterThreshold::Literal(_) => None,
        }
    }
}

/// One predicate of a data filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    pub kind: FilterKind,
    pub comparator: Comparator,
    pub threshold: FilterThreshold,
}

impl FilterRule {
    pub fn new(kind: FilterKind, comparator: Comparator, threshold: FilterThreshold) -> Self {
        Self {
            kind,
            comparator,
            threshold,
        }
    }
}

/// Row drop predicate: drop a row when `null_count <comparator> threshold`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropRule {
    pub comparator: Comparator,
    pub threshold: usize,
}

impl DropRule {
    pub fn new(comparator: Comparator, threshold: usize) -> Self {
        Self {
            comparator,
            threshold,
        }
    }

    /// Whether a row with `null_count` missing cells is dropped
    pub fn drops(&self, null_count: usize) -> bool {
        self.comparator.compare_counts(null_count, self.threshold)
    }
}

/// Fill method for the missing cells of a column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMethod {
    Mean,
    Median,
    /// Most frequent value, smallest on ties
    Mode,
    Constant(f64),
}

impl fmt::Display for FillMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillMethod::Mean => write!(f, "mean"),
            FillMethod::Median => write!(f, "median"),
            FillMethod::Mode => write!(f, "mode"),
            FillMethod::Constant(v) => write!(f, "{}", v),
        }
    }
}

/// Null-value handling policy of a training matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NullValueStrategy {
    pub drop: DropRule,
    /// Per-column fill methods, in declaration order
    pub columns: Vec<(String, FillMethod)>,
    /// Fill method of every unlisted column
    pub default: FillMethod,
}

impl NullValueStrategy {
    /// Fill method applying to a column
    pub fn method_for(&self, column: &str) -> FillMethod {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, method)| *method)
            .unwrap_or(self.default)
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Decision threshold, 0.5 unless configured
    pub threshold: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_method: Option<String>,

    /// Extra columns of the training set row, kept verbatim
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            validation_method: None,
            extras: BTreeMap::new(),
        }
    }
}

/// Training set of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSet {
    pub model: String,
    /// Data filter, AND-composed in order
    pub filters: Vec<FilterRule>,
    /// Training duration, the lower bound of exported observations
    pub duration: TimeWindow,
    pub null_strategy: NullValueStrategy,
    pub config: TrainingConfig,
}

impl TrainingSet {
    /// Features referenced by filter thresholds, in order, without duplicates
    pub fn threshold_references(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for rule in &self.filters {
            if let Some(name) = rule.threshold.reference() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_rule() {
        let ge = DropRule::new(Comparator::Ge, 3);
        assert!(!ge.drops(2));
        assert!(ge.drops(3));

        let gt = DropRule::new(Comparator::Gt, 3);
        assert!(!gt.drops(3));
        assert!(gt.drops(4));
    }

    #[test]
    fn test_method_for_falls_back_to_default() {
        let strategy = NullValueStrategy {
            drop: DropRule::new(Comparator::Ge, 3),
            columns: vec![
                ("glucose".to_string(), FillMethod::Median),
                ("age".to_string(), FillMethod::Constant(40.0)),
            ],
            default: FillMethod::Mode,
        };

        assert_eq!(strategy.method_for("glucose"), FillMethod::Median);
        assert_eq!(strategy.method_for("age"), FillMethod::Constant(40.0));
        assert_eq!(strategy.method_for("bmi"), FillMethod::Mode);
    }

    #[test]
    fn test_threshold_references() {
        let set = TrainingSet {
            model: "spc".to_string(),
            filters: vec![
                FilterRule::new(
                    FilterKind::Date,
                    Comparator::Le,
                    FilterThreshold::Reference("surgery".to_string()),
                ),
                FilterRule::new(
                    FilterKind::Value,
                    Comparator::Gt,
                    FilterThreshold::Literal(Value::Number(0.0)),
                ),
                FilterRule::new(
                    FilterKind::Date,
                    Comparator::Ge,
                    FilterThreshold::Reference("surgery".to_string()),
                ),
            ],
            duration: TimeWindow::years(1),
            null_strategy: NullValueStrategy {
                drop: DropRule::new(Comparator::Ge, 3),
                columns: Vec::new(),
                default: FillMethod::Mean,
            },
            config: TrainingConfig::default(),
        };

        assert_eq!(set.threshold_references(), vec!["surgery"]);
        assert_eq!(set.config.threshold, 0.5);
    }
}
