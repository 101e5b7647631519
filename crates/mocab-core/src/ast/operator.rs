//! Operators for MoCab conditions and formula expressions

use crate::error::CoreError;
use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Binary operators used by formula expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    // Comparison operators
    /// Equal (==)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,

    // Arithmetic operators
    /// Addition (+)
    Add,
    /// Subtraction (-)
    Sub,
    /// Multiplication (*)
    Mul,
    /// Division (/)
    Div,
    /// Modulo (%)
    Mod,
    /// Power (**)
    Pow,

    // Logical operators
    /// Logical AND (&&, and)
    And,
    /// Logical OR (||, or)
    Or,
}

impl Operator {
    /// Returns true if this is a comparison operator
    pub fn is_comparison(&self) -> bool {
        self.as_comparator().is_some()
    }

    /// Returns true if this is an arithmetic operator
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Operator::Add | Operator::Sub | Operator::Mul | Operator::Div | Operator::Mod | Operator::Pow
        )
    }

    /// Returns true if this is a logical operator
    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::And | Operator::Or)
    }

    /// The comparator equivalent of a comparison operator
    pub fn as_comparator(&self) -> Option<Comparator> {
        match self {
            Operator::Eq => Some(Comparator::Eq),
            Operator::Ne => Some(Comparator::Ne),
            Operator::Gt => Some(Comparator::Gt),
            Operator::Ge => Some(Comparator::Ge),
            Operator::Lt => Some(Comparator::Lt),
            Operator::Le => Some(Comparator::Le),
            _ => None,
        }
    }
}

/// Comparator tokens of the table grammar (`eq`, `ne`, `gt`, `ge`, `lt`, `le`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    #[default]
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Eq => "eq",
            Comparator::Ne => "ne",
            Comparator::Gt => "gt",
            Comparator::Ge => "ge",
            Comparator::Lt => "lt",
            Comparator::Le => "le",
        }
    }

    /// Whether an ordering between left and right operand satisfies the comparator
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Comparator::Eq => ordering == Ordering::Equal,
            Comparator::Ne => ordering != Ordering::Equal,
            Comparator::Gt => ordering == Ordering::Greater,
            Comparator::Ge => ordering != Ordering::Less,
            Comparator::Lt => ordering == Ordering::Less,
            Comparator::Le => ordering != Ordering::Greater,
        }
    }

    /// Compare two values.
    ///
    /// Returns `None` when the comparison is undefined: a missing operand, or
    /// an ordering comparator applied to incompatible types. Equality between
    /// incompatible types is simply false (and inequality true).
    ///
    /// `Ne` against a missing operand is `None` as well, so a rule such as
    /// `ne|5` never holds for an absent value. Presence is tested with the
    /// `nan` marker instead (`ne|nan`).
    pub fn evaluate(&self, lhs: &Value, rhs: &Value) -> Option<bool> {
        if lhs.is_null() || rhs.is_null() {
            return None;
        }

        match lhs.loose_cmp(rhs) {
            Some(ordering) => Some(self.accepts(ordering)),
            None => match self {
                Comparator::Eq => Some(false),
                Comparator::Ne => Some(true),
                _ => None,
            },
        }
    }

    /// Compare two counts (used by the row drop rule)
    pub fn compare_counts(&self, lhs: usize, rhs: usize) -> bool {
        self.accepts(lhs.cmp(&rhs))
    }
}

impl FromStr for Comparator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" => Ok(Comparator::Eq),
            "ne" => Ok(Comparator::Ne),
            "gt" => Ok(Comparator::Gt),
            "ge" => Ok(Comparator::Ge),
            "lt" => Ok(Comparator::Lt),
            "le" => Ok(Comparator::Le),
            _ => Err(CoreError::InvalidComparator(s.to_string())),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
