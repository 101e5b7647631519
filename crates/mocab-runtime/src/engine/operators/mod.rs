//! Operator execution modules
//!
//! Operand values arrive normalized: numeric strings are already numbers and
//! missing markers are null.

mod binary;
mod comparison;
mod unary;

pub(crate) use binary::execute_binary_op;
pub(crate) use comparison::execute_compare;
pub(crate) use unary::execute_unary_op;
