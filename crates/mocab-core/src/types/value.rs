//! Runtime value types for MoCab
//!
//! The `Value` enum represents raw observation values as well as resolved
//! variable values. Raw strings coming from configuration tables or from the
//! clinical data source are coerced with [`Value::coerce`], which mirrors the
//! typing rules of the tables: int, then float, then string; `true`/`false`
//! become booleans and `nan`/`none` become the missing marker (`Null`).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Runtime value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Missing value (absent observation, `nan`, unresolved variable)
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Number value (f64 for simplicity, handles both int and float)
    Number(f64),
    /// String value
    String(String),
}

impl Value {
    /// Coerce a raw table/observation token into a typed value.
    pub fn coerce(raw: &str) -> Value {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            "nan" | "none" | "null" | "" => return Value::Null,
            _ => {}
        }

        if let Ok(int) = trimmed.parse::<i64>() {
            return Value::Number(int as f64);
        }
        if let Ok(float) = trimmed.parse::<f64>() {
            if float.is_nan() {
                return Value::Null;
            }
            return Value::Number(float);
        }

        Value::String(trimmed.to_string())
    }

    /// Normalize a value before comparison: strings are re-coerced and NaN
    /// numbers collapse to `Null`.
    pub fn normalized(&self) -> Value {
        match self {
            Value::String(s) => Value::coerce(s),
            Value::Number(n) if n.is_nan() => Value::Null,
            other => other.clone(),
        }
    }

    /// Returns true for the missing marker
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the value. Booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self.normalized() {
            Value::Number(n) => Some(n),
            Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
        }
    }

    /// Ordering between two values after normalization.
    ///
    /// Returns `None` when either side is missing or when the types cannot be
    /// ordered (e.g. a string against a number).
    pub fn loose_cmp(&self, other: &Value) -> Option<Ordering> {
        let lhs = self.normalized();
        let rhs = other.normalized();

        match (&lhs, &rhs) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::String(_), _) | (_, Value::String(_)) => None,
            _ => {
                let a = lhs.as_f64()?;
                let b = rhs.as_f64()?;
                a.partial_cmp(&b)
            }
        }
    }

    /// Total ordering used for deterministic tie breaking (mode selection).
    /// Nulls first, then booleans, numbers and strings.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Number(_) => 2,
                Value::String(_) => 3,
            }
        }

        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        if n.is_nan() {
            Value::Null
        } else {
            Value::Number(n)
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Option<f64>> for Value {
    fn from(n: Option<f64>) -> Self {
        n.map(Value::from).unwrap_or(Value::Null)
    }
}
