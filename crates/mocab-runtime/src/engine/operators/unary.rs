//! Unary operator execution

use crate::error::{Result, RuntimeError};
use mocab_core::ast::UnaryOperator;
use mocab_core::Value;

/// Execute a unary operation
pub(crate) fn execute_unary_op(operand: &Value, op: &UnaryOperator) -> Result<Value> {
    match (op, operand) {
        (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOperator::Not, Value::Number(n)) => Ok(Value::Bool(*n == 0.0)),
        (UnaryOperator::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
        _ => Err(RuntimeError::TypeError(format!(
            "Cannot apply {:?} to {}",
            op,
            operand.type_name()
        ))),
    }
}
