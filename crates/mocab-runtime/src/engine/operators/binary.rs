//! Binary operator execution

use crate::error::{Result, RuntimeError};
use mocab_core::ast::Operator;
use mocab_core::Value;

/// Execute an arithmetic or logical operation
pub(crate) fn execute_binary_op(left: &Value, op: &Operator, right: &Value) -> Result<Value> {
    if op.is_logical() {
        let l = truthy(left, op)?;
        let r = truthy(right, op)?;
        return Ok(Value::Bool(match op {
            Operator::And => l && r,
            _ => l || r,
        }));
    }

    let (l, r) = match (numeric(left), numeric(right)) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            return Err(RuntimeError::TypeError(format!(
                "Cannot apply {:?} to {} and {}",
                op,
                left.type_name(),
                right.type_name()
            )))
        }
    };

    match op {
        Operator::Add => Ok(Value::Number(l + r)),
        Operator::Sub => Ok(Value::Number(l - r)),
        Operator::Mul => Ok(Value::Number(l * r)),
        Operator::Div => {
            if r == 0.0 {
                Err(RuntimeError::DivisionByZero)
            } else {
                Ok(Value::Number(l / r))
            }
        }
        Operator::Mod => {
            if r == 0.0 {
                Err(RuntimeError::DivisionByZero)
            } else {
                Ok(Value::Number(l % r))
            }
        }
        Operator::Pow => Ok(Value::Number(l.powf(r))),
        _ => Err(RuntimeError::InvalidOperation(format!(
            "{:?} is not an arithmetic operator",
            op
        ))),
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn truthy(value: &Value, op: &Operator) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0),
        other => Err(RuntimeError::TypeError(format!(
            "Cannot apply {:?} to {}",
            op,
            other.type_name()
        ))),
    }
}
