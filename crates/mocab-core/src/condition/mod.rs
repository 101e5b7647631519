//! Condition Parsing Module
//!
//! This module provides shared condition parsing logic used by:
//! - Category rows of the transformation table
//! - Data filters of the training sets table
//!
//! # Syntax
//!
//! ## Category conditions
//! ```text
//! LABEL=cond1&cond2&...
//! cond := threshold | [variable]prefix|threshold | [default]
//! ```
//! A bare threshold compares the row's own feature with `eq`. The `[variable]`
//! and `prefix` parts are both optional once a `|` is present. A threshold of
//! `nan` tests for a missing (`eq`) or present (`ne`) value, and a threshold
//! written `[name]` compares against another variable.
//!
//! ## Data filters
//! ```text
//! ((date|value))?(prefix|)?(threshold|[feature]) joined by &
//! ```
//!
//! ## Supported prefixes
//! - `eq` (equal, the default)
//! - `ne` (not equal)
//! - `gt` / `ge` (greater than / or equal)
//! - `lt` / `le` (less than / or equal)

mod parser;
mod types;

pub use parser::ConditionParser;
pub use types::{CategoryRule, ParsedCondition, ParsedValue};
