//! Expression AST nodes
//!
//! Formula rows of the transformation table compile to this tree once at load
//! time; evaluation walks it against a value frame.

use super::operator::Operator;
use crate::types::Value;
use serde::{Deserialize, Serialize};

/// Expression AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Literal value
    Literal(Value),

    /// Named variable reference, written `[name]` in a formula
    Reference(String),

    /// Binary operation
    Binary {
        left: Box<Expression>,
        op: Operator,
        right: Box<Expression>,
    },

    /// Unary operation
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// Logical NOT (!, not)
    Not,
    /// Arithmetic negation (-)
    Negate,
}

impl Expression {
    /// Create a literal expression
    pub fn literal(value: Value) -> Self {
        Expression::Literal(value)
    }

    /// Create a reference expression
    pub fn reference(name: impl Into<String>) -> Self {
        Expression::Reference(name.into())
    }

    /// Create a binary expression
    pub fn binary(left: Expression, op: Operator, right: Expression) -> Self {
        Expression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Create a unary expression
    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Names referenced by the expression, in first-appearance order, without duplicates
    pub fn references(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_references(&mut names);
        names
    }

    fn collect_references(&self, names: &mut Vec<String>) {
        match self {
            Expression::Literal(_) => {}
            Expression::Reference(name) => {
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
            }
            Expression::Binary { left, right, .. } => {
                left.collect_references(names);
                right.collect_references(names);
            }
            Expression::Unary { operand, .. } => operand.collect_references(names),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_expression() {
        let expr = Expression::literal(Value::Number(42.0));
        assert_eq!(expr, Expression::Literal(Value::Number(42.0)));
    }

    #[test]
    fn test_binary_expression() {
        // [weight] / [height]
        let expr = Expression::binary(
            Expression::reference("weight"),
            Operator::Div,
            Expression::reference("height"),
        );

        match expr {
            Expression::Binary { left, op, right } => {
                assert_eq!(op, Operator::Div);
                assert_eq!(*left, Expression::Reference("weight".to_string()));
                assert_eq!(*right, Expression::Reference("height".to_string()));
            }
            _ => panic!("Expected Binary expression"),
        }
    }

    #[test]
    fn test_unary_expression() {
        let expr = Expression::unary(UnaryOperator::Negate, Expression::literal(Value::Number(1.0)));
        assert!(matches!(
            expr,
            Expression::Unary {
                op: UnaryOperator::Negate,
                ..
            }
        ));
    }

    #[test]
    fn test_references_are_deduplicated_in_order() {
        // [weight] / ([height] / 100) ** 2 + [weight]
        let expr = Expression::binary(
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
            ),
            Operator::Add,
            Expression::reference("weight"),
        );

        assert_eq!(expr.references(), vec!["weight".to_string(), "height".to_string()]);
    }
}
