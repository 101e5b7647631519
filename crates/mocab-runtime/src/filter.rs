//! Filter engine
//!
//! Applies the ordered rules of a training set's data filter to a data set.
//! Rules are AND-composed per point and evaluation stops at the first failing
//! rule.
//!
//! Missing inputs are treated asymmetrically:
//! - a rule whose threshold is unavailable (the referenced feature resolved to
//!   nothing) passes, so scarce context never removes data;
//! - a rule whose point lacks the inspected date or value fails, so the point
//!   is excluded.

use crate::dataset::{DataPoint, DataSet, Selection};
use chrono::NaiveDateTime;
use mocab_core::ast::{FilterKind, FilterRule, FilterThreshold};
use mocab_core::{parse_timestamp, Value};
use std::collections::HashMap;
use tracing::debug;

/// A rule threshold after reference substitution
#[derive(Debug, Clone, PartialEq)]
pub enum BoundThreshold {
    Date(NaiveDateTime),
    Value(Value),
    Unavailable,
}

/// Filter engine over an ordered rule list
pub struct FilterEngine<'a> {
    rules: &'a [FilterRule],
}

impl<'a> FilterEngine<'a> {
    pub fn new(rules: &'a [FilterRule]) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Features whose resolved values serve as thresholds
    pub fn referenced_features(&self) -> Vec<&'a str> {
        let mut names: Vec<&str> = Vec::new();
        for rule in self.rules {
            if let Some(name) = rule.threshold.reference() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute every threshold, reading references from the referenced
    /// features' aggregated selections
    pub fn bind(&self, references: &HashMap<String, Selection>) -> Vec<BoundThreshold> {
        self.rules
            .iter()
            .map(|rule| {
                let bound = match &rule.threshold {
                    FilterThreshold::Literal(value) => Self::bind_literal(rule.kind, value),
                    FilterThreshold::Reference(name) => match references.get(name) {
                        Some(selection) => Self::bind_selection(rule.kind, selection),
                        None => BoundThreshold::Unavailable,
                    },
                };
                if bound == BoundThreshold::Unavailable {
                    debug!(
                        "Threshold of rule ({}){}|{:?} unavailable, rule passes",
                        rule.kind, rule.comparator, rule.threshold
                    );
                }
                bound
            })
            .collect()
    }

    /// Keep the points every rule accepts, in original order
    pub fn apply(&self, data: &DataSet, thresholds: &[BoundThreshold]) -> DataSet {
        data.iter()
            .filter(|point| {
                self.rules
                    .iter()
                    .zip(thresholds)
                    .all(|(rule, threshold)| Self::accepts(rule, threshold, point))
            })
            .cloned()
            .collect()
    }

    /// Evaluate one rule against one point
    pub fn accepts(rule: &FilterRule, threshold: &BoundThreshold, point: &DataPoint) -> bool {
        match (rule.kind, threshold) {
            (_, BoundThreshold::Unavailable) => true,
            (FilterKind::Date, BoundThreshold::Date(threshold)) => match point.date {
                Some(date) => rule.comparator.accepts(date.date().cmp(&threshold.date())),
                None => false,
            },
            (FilterKind::Value, BoundThreshold::Value(threshold)) => {
                if point.value.is_null() {
                    return false;
                }
                point
                    .value
                    .loose_cmp(threshold)
                    .map(|ordering| rule.comparator.accepts(ordering))
                    .unwrap_or(false)
            }
            _ => false,
        }
    }

    fn bind_literal(kind: FilterKind, value: &Value) -> BoundThreshold {
        match kind {
            FilterKind::Date => parse_timestamp(&value.to_string())
                .map(BoundThreshold::Date)
                .unwrap_or(BoundThreshold::Unavailable),
            FilterKind::Value if value.is_null() => BoundThreshold::Unavailable,
            FilterKind::Value => BoundThreshold::Value(value.normalized()),
        }
    }

    fn bind_selection(kind: FilterKind, selection: &Selection) -> BoundThreshold {
        match kind {
            FilterKind::Date => selection
                .date()
                .map(BoundThreshold::Date)
                .unwrap_or(BoundThreshold::Unavailable),
            FilterKind::Value => {
                let value = selection.value().normalized();
                if value.is_null() {
                    BoundThreshold::Unavailable
                } else {
                    BoundThreshold::Value(value)
                }
            }
        }
    }
}
