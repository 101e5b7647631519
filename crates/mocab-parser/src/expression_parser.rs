//! Formula expression parser
//!
//! Parses the `formulate` column of formula rows into Expression AST nodes.
//!
//! Supported syntax:
//! - References: `[weight]`, `[height]`
//! - Literals: `42`, `0.627`, `true`, `false`
//! - Arithmetic: `+`, `-`, `*`, `/`, `%`, `**`
//! - Comparisons: `>`, `<`, `>=`, `<=`, `==`, `!=`
//! - Logic: `and`, `or`, `not` (also `&&`, `||`, `!`)
//! - Unary minus and parentheses for grouping: `-([a] + [b]) * 2`
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons, additive,
//! multiplicative, unary minus, `**` (right associative).

use crate::error::{ParseError, Result};
use mocab_core::ast::{Expression, Operator, UnaryOperator};
use mocab_core::Value;

/// Expression parser
pub struct ExpressionParser;

impl ExpressionParser {
    /// Parse an expression from a string
    pub fn parse(input: &str) -> Result<Expression> {
        let input = input.trim();

        if input.is_empty() {
            return Err(ParseError::InvalidExpression("Empty expression".to_string()));
        }

        Self::check_balanced(input)?;
        Self::parse_expression(input)
    }

    /// Parse a complete expression (handles binary operators with precedence)
    fn parse_expression(input: &str) -> Result<Expression> {
        Self::parse_or(input.trim())
    }

    fn parse_or(input: &str) -> Result<Expression> {
        if let Some((left, op, right)) = Self::split_by_keyword_operator(input, &["or"])
            .or_else(|| Self::split_by_operator(input, &["||"]))
        {
            return Self::binary(left, op, right, Self::parse_or, Self::parse_and);
        }
        Self::parse_and(input)
    }

    fn parse_and(input: &str) -> Result<Expression> {
        if let Some((left, op, right)) = Self::split_by_keyword_operator(input, &["and"])
            .or_else(|| Self::split_by_operator(input, &["&&"]))
        {
            return Self::binary(left, op, right, Self::parse_and, Self::parse_not);
        }
        Self::parse_not(input)
    }

    fn parse_not(input: &str) -> Result<Expression> {
        let input = input.trim();

        if let Some(rest) = input.strip_prefix("not") {
            if rest.starts_with(|c: char| c.is_whitespace() || c == '(') {
                return Ok(Expression::unary(UnaryOperator::Not, Self::parse_not(rest)?));
            }
        }

        if let Some(rest) = input.strip_prefix('!') {
            if !rest.starts_with('=') {
                return Ok(Expression::unary(UnaryOperator::Not, Self::parse_not(rest)?));
            }
        }

        Self::parse_comparison(input)
    }

    fn parse_comparison(input: &str) -> Result<Expression> {
        if let Some((left, op, right)) =
            Self::split_by_operator(input, &["==", "!=", "<=", ">=", "<", ">"])
        {
            return Self::binary(left, op, right, Self::parse_comparison, Self::parse_additive);
        }
        Self::parse_additive(input)
    }

    fn parse_additive(input: &str) -> Result<Expression> {
        if let Some((left, op, right)) = Self::split_by_operator(input, &["+", "-"]) {
            return Self::binary(left, op, right, Self::parse_additive, Self::parse_multiplicative);
        }
        Self::parse_multiplicative(input)
    }

    fn parse_multiplicative(input: &str) -> Result<Expression> {
        if let Some((left, op, right)) = Self::split_by_operator(input, &["*", "/", "%"]) {
            return Self::binary(left, op, right, Self::parse_multiplicative, Self::parse_unary);
        }
        Self::parse_unary(input)
    }

    fn parse_unary(input: &str) -> Result<Expression> {
        let input = input.trim();

        if let Some(rest) = input.strip_prefix('-') {
            let operand = Self::parse_unary(rest)?;
            // Fold negative number literals
            if let Expression::Literal(Value::Number(n)) = operand {
                return Ok(Expression::literal(Value::Number(-n)));
            }
            return Ok(Expression::unary(UnaryOperator::Negate, operand));
        }

        if let Some(rest) = input.strip_prefix('+') {
            return Self::parse_unary(rest);
        }

        Self::parse_power(input)
    }

    fn parse_power(input: &str) -> Result<Expression> {
        // Right associative: split at the leftmost top-level `**`
        if let Some(pos) = Self::find_leftmost(input, "**") {
            let left = &input[..pos];
            let right = &input[pos + 2..];
            if left.trim().is_empty() || right.trim().is_empty() {
                return Err(ParseError::InvalidExpression(format!(
                    "Missing operand for '**' in: {}",
                    input
                )));
            }
            return Ok(Expression::binary(
                Self::parse_primary(left)?,
                Operator::Pow,
                Self::parse_unary(right)?,
            ));
        }
        Self::parse_primary(input)
    }

    /// Parse a primary expression
    fn parse_primary(input: &str) -> Result<Expression> {
        let input = input.trim();

        if input.is_empty() {
            return Err(ParseError::InvalidExpression("Missing operand".to_string()));
        }

        // Check for parentheses
        if input.starts_with('(') && input.ends_with(')') && Self::wraps(input) {
            return Self::parse_expression(&input[1..input.len() - 1]);
        }

        // Check for references
        if input.starts_with('[') && input.ends_with(']') {
            let name = input[1..input.len() - 1].trim();
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(ParseError::InvalidExpression(format!(
                    "Invalid reference: {}",
                    input
                )));
            }
            return Ok(Expression::reference(name));
        }

        // Check for boolean literals
        match input {
            "true" | "True" => return Ok(Expression::literal(Value::Bool(true))),
            "false" | "False" => return Ok(Expression::literal(Value::Bool(false))),
            _ => {}
        }

        // Check for number literals
        if input.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            if let Ok(num) = input.parse::<f64>() {
                if num.is_finite() {
                    return Ok(Expression::literal(Value::Number(num)));
                }
            }
        }

        Err(ParseError::InvalidExpression(format!("Cannot parse: {}", input)))
    }

    fn binary(
        left: &str,
        op: &str,
        right: &str,
        parse_left: fn(&str) -> Result<Expression>,
        parse_right: fn(&str) -> Result<Expression>,
    ) -> Result<Expression> {
        if right.is_empty() {
            return Err(ParseError::InvalidExpression(format!(
                "Missing right operand for '{}'",
                op
            )));
        }
        let op = Self::parse_operator(op)?;
        Ok(Expression::binary(parse_left(left)?, op, parse_right(right)?))
    }

    /// Split input by binary operator (respecting parentheses and references)
    fn split_by_operator<'a>(input: &'a str, operators: &[&str]) -> Option<(&'a str, &'a str, &'a str)> {
        let mut depth = 0i32;
        let bytes = input.as_bytes();

        // Scan from right to left to handle left-to-right associativity
        for i in (0..bytes.len()).rev() {
            match bytes[i] {
                b')' | b']' => depth += 1,
                b'(' | b'[' => depth -= 1,
                _ => {}
            }

            if depth != 0 {
                continue;
            }

            for &op in operators {
                if !bytes[i..].starts_with(op.as_bytes()) {
                    continue;
                }

                // Make sure it's not part of another operator
                let end = i + op.len();
                let isolated = (i == 0 || !Self::is_operator_char(bytes[i - 1] as char))
                    && (end >= bytes.len() || !Self::is_operator_char(bytes[end] as char));

                // A sign with no operand on its left is unary
                let left = input[..i].trim_end();
                let has_left_operand = left
                    .chars()
                    .last()
                    .map(|c| !Self::is_operator_char(c) && c != '(')
                    .unwrap_or(false)
                    && !Self::ends_with_keyword(left);

                if isolated && has_left_operand && !Self::is_exponent_sign(bytes, i) {
                    return Some((left, &input[i..end], input[end..].trim()));
                }
            }
        }

        None
    }

    /// Whether the sign at `i` belongs to a literal such as `1e-5`
    fn is_exponent_sign(bytes: &[u8], i: usize) -> bool {
        if !matches!(bytes[i], b'+' | b'-') || i < 2 || !matches!(bytes[i - 1], b'e' | b'E') {
            return false;
        }
        let mantissa = bytes[..i - 1]
            .iter()
            .rev()
            .take_while(|b| b.is_ascii_digit() || **b == b'.')
            .count();
        let start = i - 1 - mantissa;
        mantissa > 0
            && bytes[start..i - 1].iter().any(u8::is_ascii_digit)
            && (start == 0 || !(bytes[start - 1].is_ascii_alphanumeric() || bytes[start - 1] == b'_'))
    }

    /// Split input by keyword operator (respecting parentheses and word boundaries)
    fn split_by_keyword_operator<'a>(input: &'a str, operators: &[&str]) -> Option<(&'a str, &'a str, &'a str)> {
        let mut depth = 0i32;
        let bytes = input.as_bytes();

        for i in (0..bytes.len()).rev() {
            match bytes[i] {
                b')' | b']' => depth += 1,
                b'(' | b'[' => depth -= 1,
                _ => {}
            }

            if depth != 0 {
                continue;
            }

            for &op in operators {
                if !bytes[i..].starts_with(op.as_bytes()) {
                    continue;
                }

                // For keyword operators, check word boundaries
                let end = i + op.len();
                let boundary_before = i > 0 && matches!(bytes[i - 1], b' ' | b'\t' | b')' | b']');
                let boundary_after = end < bytes.len() && matches!(bytes[end], b' ' | b'\t' | b'(' | b'[');

                if boundary_before && boundary_after {
                    return Some((input[..i].trim(), &input[i..end], input[end..].trim()));
                }
            }
        }

        None
    }

    /// Position of the leftmost top-level occurrence of `op`
    fn find_leftmost(input: &str, op: &str) -> Option<usize> {
        let mut depth = 0i32;
        let bytes = input.as_bytes();

        for i in 0..bytes.len() {
            match bytes[i] {
                b'(' | b'[' => depth += 1,
                b')' | b']' => depth -= 1,
                _ => {}
            }
            if depth == 0 && bytes[i..].starts_with(op.as_bytes()) {
                return Some(i);
            }
        }

        None
    }

    /// Whether the outer parentheses of `input` enclose all of it
    fn wraps(input: &str) -> bool {
        let mut depth = 0i32;
        for (i, c) in input.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 && i != input.len() - 1 {
                        return false;
                    }
                }
                _ => {}
            }
        }
        depth == 0
    }

    fn check_balanced(input: &str) -> Result<()> {
        let mut stack = Vec::new();
        for c in input.chars() {
            match c {
                '(' | '[' => stack.push(c),
                ')' if stack.pop() == Some('(') => {}
                ']' if stack.pop() == Some('[') => {}
                ')' | ']' => {
                    return Err(ParseError::InvalidExpression(format!(
                        "Unbalanced '{}' in: {}",
                        c, input
                    )))
                }
                _ => {}
            }
        }

        if stack.is_empty() {
            Ok(())
        } else {
            Err(ParseError::InvalidExpression(format!(
                "Unclosed bracket in: {}",
                input
            )))
        }
    }

    fn ends_with_keyword(left: &str) -> bool {
        ["and", "or", "not"].iter().any(|kw| {
            left.strip_suffix(kw)
                .map(|rest| rest.is_empty() || rest.ends_with(|c: char| c.is_whitespace() || c == ')'))
                .unwrap_or(false)
        })
    }

    /// Check if a character is part of an operator
    fn is_operator_char(c: char) -> bool {
        matches!(c, '=' | '!' | '<' | '>' | '&' | '|' | '+' | '-' | '*' | '/' | '%')
    }

    /// Parse an operator string
    fn parse_operator(op: &str) -> Result<Operator> {
        match op {
            "==" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            ">" => Ok(Operator::Gt),
            "<=" => Ok(Operator::Le),
            ">=" => Ok(Operator::Ge),
            "+" => Ok(Operator::Add),
            "-" => Ok(Operator::Sub),
            "*" => Ok(Operator::Mul),
            "/" => Ok(Operator::Div),
            "%" => Ok(Operator::Mod),
            "**" => Ok(Operator::Pow),
            "&&" | "and" => Ok(Operator::And),
            "||" | "or" => Ok(Operator::Or),
            _ => Err(ParseError::InvalidOperator(op.to_string())),
        }
    }
}
