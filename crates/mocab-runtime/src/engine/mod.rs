//! Expression evaluation
//!
//! Walks a compiled formula tree against a variable lookup. Evaluation never
//! touches shared state; every reference is read through the caller's lookup.

mod operators;

use crate::error::{Result, RuntimeError};
use mocab_core::ast::Expression;
use mocab_core::Value;
use operators::{execute_binary_op, execute_compare, execute_unary_op};

/// Evaluator for compiled formula expressions
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    /// Evaluate an expression, reading references through `lookup`.
    ///
    /// A reference the lookup cannot answer, or that holds no value, fails
    /// with [`RuntimeError::MissingValue`].
    pub fn evaluate<F>(expr: &Expression, lookup: &F) -> Result<Value>
    where
        F: Fn(&str) -> Result<Value>,
    {
        let value = match expr {
            Expression::Literal(value) => value.normalized(),
            Expression::Reference(name) => {
                let value = lookup(name)?.normalized();
                if value.is_null() {
                    return Err(RuntimeError::MissingValue(name.clone()));
                }
                value
            }
            Expression::Binary { left, op, right } => {
                let lhs = Self::evaluate(left, lookup)?;
                let rhs = Self::evaluate(right, lookup)?;
                match op.as_comparator() {
                    Some(comparator) => Value::Bool(execute_compare(&lhs, comparator, &rhs)?),
                    None => execute_binary_op(&lhs, op, &rhs)?,
                }
            }
            Expression::Unary { op, operand } => {
                let value = Self::evaluate(operand, lookup)?;
                execute_unary_op(&value, op)?
            }
        };

        if let Value::Number(n) = value {
            if !n.is_finite() {
                return Err(RuntimeError::InvalidOperation(format!(
                    "Non-finite result: {}",
                    n
                )));
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocab_core::ast::{Operator, UnaryOperator};
    use std::collections::HashMap;

    fn lookup_in(values: HashMap<&'static str, Value>) -> impl Fn(&str) -> Result<Value> {
        move |name: &str| {
            values
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::MissingValue(name.to_string()))
        }
    }

    fn bmi() -> Expression {
        // [weight] / ([height] / 100) ** 2
        Expression::binary(
            Expression::reference("weight"),
            Operator::Div,
            Expression::binary(
                Expression::binary(
                    Expression::reference("height"),
                    Operator::Div,
                    Expression::literal(Value::Number(100.0)),
                ),
                Operator::Pow,
                Expression::literal(Value::Number(2.0)),
            ),
        )
    }

    #[test]
    fn test_evaluate_bmi() {
        let lookup = lookup_in(HashMap::from([
            ("weight", Value::Number(69.0)),
            ("height", Value::Number(176.0)),
        ]));
        let result = ExpressionEvaluator::evaluate(&bmi(), &lookup).unwrap();
        match result {
            Value::Number(n) => assert!((n - 22.275309917355372).abs() < 1e-9),
            other => panic!("Expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_string_operands_are_coerced() {
        let lookup = lookup_in(HashMap::from([
            ("weight", Value::String("69".to_string())),
            ("height", Value::Number(176.0)),
        ]));
        assert!(ExpressionEvaluator::evaluate(&bmi(), &lookup).is_ok());
    }

    #[test]
    fn test_missing_reference_fails() {
        let lookup = lookup_in(HashMap::from([("weight", Value::Number(69.0))]));
        let err = ExpressionEvaluator::evaluate(&bmi(), &lookup).unwrap_err();
        assert!(matches!(err, RuntimeError::MissingValue(name) if name == "height"));

        let lookup = lookup_in(HashMap::from([
            ("weight", Value::Number(69.0)),
            ("height", Value::Null),
        ]));
        assert!(ExpressionEvaluator::evaluate(&bmi(), &lookup).is_err());
    }

    #[test]
    fn test_division_by_zero_fails() {
        let lookup = lookup_in(HashMap::from([
            ("weight", Value::Number(69.0)),
            ("height", Value::Number(0.0)),
        ]));
        let err = ExpressionEvaluator::evaluate(&bmi(), &lookup).unwrap_err();
        assert!(matches!(err, RuntimeError::DivisionByZero));
    }

    #[test]
    fn test_comparison_and_logic() {
        let lookup = lookup_in(HashMap::from([("age", Value::Number(70.0))]));
        let expr = Expression::binary(
            Expression::binary(
                Expression::reference("age"),
                Operator::Gt,
                Expression::literal(Value::Number(65.0)),
            ),
            Operator::And,
            Expression::unary(UnaryOperator::Not, Expression::literal(Value::Bool(false))),
        );
        assert_eq!(
            ExpressionEvaluator::evaluate(&expr, &lookup).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_incompatible_types_fail() {
        let lookup = lookup_in(HashMap::from([("sex", Value::String("male".to_string()))]));
        let expr = Expression::binary(
            Expression::reference("sex"),
            Operator::Add,
            Expression::literal(Value::Number(1.0)),
        );
        assert!(matches!(
            ExpressionEvaluator::evaluate(&expr, &lookup),
            Err(RuntimeError::TypeError(_))
        ));
    }
}
