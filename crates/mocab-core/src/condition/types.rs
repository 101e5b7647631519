//! Condition types for category rows

use crate::ast::operator::Comparator;
use crate::types::Value;
use serde::{Deserialize, Serialize};

/// Right-hand side of a category condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParsedValue {
    /// Static literal value
    Literal(Value),
    /// Current value of another variable, written `[name]`
    Reference(String),
    /// The `nan` marker: `eq` tests for a missing value, `ne` for a present one
    Missing,
    /// The `[default]` catch-all, always true
    Default,
}

impl ParsedValue {
    /// Create a literal value
    pub fn literal(value: Value) -> Self {
        ParsedValue::Literal(value)
    }

    /// Create a reference to another variable
    pub fn reference(name: impl Into<String>) -> Self {
        ParsedValue::Reference(name.into())
    }

    /// Referenced variable name, if any
    pub fn reference_name(&self) -> Option<&str> {
        match self {
            ParsedValue::Reference(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ParsedValue::Default)
    }
}

/// A parsed condition of a category row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCondition {
    /// Variable under test; `None` means the row's own feature
    pub subject: Option<String>,
    /// Comparison operator
    pub comparator: Comparator,
    /// Value to compare against
    pub value: ParsedValue,
}

impl ParsedCondition {
    /// Create a new parsed condition
    pub fn new(subject: Option<String>, comparator: Comparator, value: ParsedValue) -> Self {
        Self {
            subject,
            comparator,
            value,
        }
    }

    /// Name of the variable under test, defaulting to `feature`
    pub fn subject_or<'a>(&'a self, feature: &'a str) -> &'a str {
        self.subject.as_deref().unwrap_or(feature)
    }

    /// Evaluate against the subject's current value and the resolved
    /// right-hand side (only consulted for literals and references)
    pub fn evaluate(&self, subject: &Value, rhs: &Value) -> bool {
        match &self.value {
            ParsedValue::Default => true,
            ParsedValue::Missing => match self.comparator {
                Comparator::Ne => !subject.is_null(),
                _ => subject.is_null(),
            },
            ParsedValue::Literal(_) | ParsedValue::Reference(_) => {
                self.comparator.evaluate(subject, rhs).unwrap_or(false)
            }
        }
    }
}

/// `LABEL=cond1&cond2…`: the label is produced when every condition holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub label: Value,
    pub conditions: Vec<ParsedCondition>,
}

impl CategoryRule {
    pub fn new(label: Value, conditions: Vec<ParsedCondition>) -> Self {
        Self { label, conditions }
    }

    /// Whether this rule is the `[default]` catch-all
    pub fn is_default(&self) -> bool {
        self.conditions.iter().any(|c| c.value.is_default())
    }

    /// Variable names this rule reads, given the row's own feature
    pub fn dependencies<'a>(&'a self, feature: &'a str) -> Vec<&'a str> {
        let mut names: Vec<&str> = Vec::new();
        for condition in &self.conditions {
            if condition.value.is_default() {
                continue;
            }
            let subject = condition.subject_or(feature);
            if !names.contains(&subject) {
                names.push(subject);
            }
            if let Some(reference) = condition.value.reference_name() {
                if !names.contains(&reference) {
                    names.push(reference);
                }
            }
        }
        names
    }
}
