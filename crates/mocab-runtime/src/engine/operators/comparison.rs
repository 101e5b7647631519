//! Comparison operator execution

use crate::error::{Result, RuntimeError};
use mocab_core::ast::Comparator;
use mocab_core::Value;

/// Execute a comparison inside a formula
pub(crate) fn execute_compare(left: &Value, comparator: Comparator, right: &Value) -> Result<bool> {
    comparator.evaluate(left, right).ok_or_else(|| {
        RuntimeError::TypeError(format!(
            "Cannot compare {} and {} with {}",
            left.type_name(),
            right.type_name(),
            comparator
        ))
    })
}
