//! Condition string parser
//!
//! Parses category rows like:
//! - `1=gt|22` (own feature, explicit comparator)
//! - `2=[spo2]le|88&[o2_flow_rate]ge|5`
//! - `0=nan` (own feature is missing)
//! - `9=[default]`
//!
//! and data filters like:
//! - `(value)gt|0`
//! - `(date)le|[surgery]&(value)ne|unknown`

use super::types::{CategoryRule, ParsedCondition, ParsedValue};
use crate::ast::operator::Comparator;
use crate::ast::training::{FilterKind, FilterRule, FilterThreshold};
use crate::error::{CoreError, Result};
use crate::types::{parse_timestamp, Value};
use regex::Regex;
use std::sync::OnceLock;

const DEFAULT_TOKEN: &str = "[default]";

fn condition_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:\[([^\]]*)\])?([a-z]{2})?\|(.*)$").expect("condition pattern is a valid regex")
    })
}

fn filter_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:\((date|value)\))?(?:([a-z]{2})\|)?(?:\[(\w+)\]|([^\s|\[\]]+))$")
            .expect("filter pattern is a valid regex")
    })
}

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\[(\w+)\]$").expect("reference pattern is a valid regex"))
}

/// Parser for the category-condition and data-filter grammars
#[derive(Debug, Default, Clone, Copy)]
pub struct ConditionParser;

impl ConditionParser {
    /// Create a new parser
    pub fn new() -> Self {
        Self
    }

    /// Parse a category row formula `LABEL=cond1&cond2…`
    pub fn parse_category(&self, formula: &str) -> Result<CategoryRule> {
        let formula = formula.trim();
        let (label, conditions) = formula
            .split_once('=')
            .ok_or_else(|| invalid(formula, "expected LABEL=conditions"))?;

        let label = Value::coerce(label);
        if label.is_null() {
            return Err(invalid(formula, "category label is empty or missing"));
        }

        if conditions.trim().is_empty() {
            return Err(invalid(formula, "no condition after '='"));
        }

        let conditions = conditions
            .split('&')
            .map(|c| self.parse_condition(c))
            .collect::<Result<Vec<_>>>()?;

        let defaults = conditions.iter().filter(|c| c.value.is_default()).count();
        if defaults > 0 && conditions.len() > 1 {
            return Err(invalid(formula, "[default] cannot be combined with other conditions"));
        }

        Ok(CategoryRule::new(label, conditions))
    }

    /// Parse a single category condition
    ///
    /// Supported formats:
    /// - `threshold` (comparator `eq`, the row's own feature)
    /// - `[name]prefix|threshold`, where both `[name]` and `prefix` are optional
    /// - `[default]`
    pub fn parse_condition(&self, condition: &str) -> Result<ParsedCondition> {
        let condition = condition.trim();
        if condition.is_empty() {
            return Err(invalid(condition, "Empty condition"));
        }

        let Some(caps) = condition_pattern().captures(condition) else {
            if condition.contains('|') {
                return Err(invalid(condition, "unrecognised condition structure"));
            }
            if condition == DEFAULT_TOKEN {
                return Ok(ParsedCondition::new(None, Comparator::Eq, ParsedValue::Default));
            }
            // Bare threshold
            let value = self.parse_threshold(condition, Comparator::Eq)?;
            return Ok(ParsedCondition::new(None, Comparator::Eq, value));
        };

        let subject = match caps.get(1) {
            Some(m) => {
                let name = m.as_str().trim();
                if name.is_empty() {
                    return Err(invalid(condition, "empty variable name"));
                }
                Some(name.to_string())
            }
            None => None,
        };

        let comparator = match caps.get(2) {
            Some(m) => m.as_str().parse::<Comparator>()?,
            None => Comparator::Eq,
        };

        let threshold = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("");
        if threshold.is_empty() {
            return Err(invalid(condition, "Must have threshold"));
        }
        if threshold == DEFAULT_TOKEN {
            return Err(invalid(condition, "[default] must stand alone"));
        }

        let value = self.parse_threshold(threshold, comparator)?;
        Ok(ParsedCondition::new(subject, comparator, value))
    }

    fn parse_threshold(&self, threshold: &str, comparator: Comparator) -> Result<ParsedValue> {
        if let Some(caps) = reference_pattern().captures(threshold) {
            return Ok(ParsedValue::reference(&caps[1]));
        }

        if threshold.eq_ignore_ascii_case("nan") {
            return match comparator {
                Comparator::Eq | Comparator::Ne => Ok(ParsedValue::Missing),
                other => Err(invalid(
                    threshold,
                    &format!("comparator '{}' is not valid for a nan threshold", other),
                )),
            };
        }

        match Value::coerce(threshold) {
            Value::Null => Err(invalid(threshold, "threshold is a missing marker")),
            value => Ok(ParsedValue::literal(value)),
        }
    }

    /// Parse a data filter; an empty filter has no rules
    pub fn parse_filter(&self, filter: &str) -> Result<Vec<FilterRule>> {
        let filter = filter.trim();
        if filter.is_empty() {
            return Ok(Vec::new());
        }

        filter.split('&').map(|rule| self.parse_filter_rule(rule)).collect()
    }

    /// Parse one `((date|value))?(comparator|)?(threshold|[feature])` rule
    pub fn parse_filter_rule(&self, rule: &str) -> Result<FilterRule> {
        let rule = rule.trim();
        let caps = filter_pattern()
            .captures(rule)
            .ok_or_else(|| invalid(rule, "data_filter format error"))?;

        let kind = match caps.get(1).map(|m| m.as_str()) {
            Some("date") => FilterKind::Date,
            _ => FilterKind::Value,
        };

        let comparator = match caps.get(2) {
            Some(m) => m.as_str().parse::<Comparator>()?,
            None => Comparator::Eq,
        };

        if let Some(reference) = caps.get(3) {
            return Ok(FilterRule::new(
                kind,
                comparator,
                FilterThreshold::Reference(reference.as_str().to_string()),
            ));
        }

        let literal = caps.get(4).map(|m| m.as_str()).unwrap_or("");
        let value = Value::coerce(literal);
        if value.is_null() {
            return Err(invalid(rule, "nan is not a valid threshold"));
        }
        if kind == FilterKind::Date && parse_timestamp(literal).is_none() {
            return Err(CoreError::InvalidTimeFormat(literal.to_string()));
        }

        Ok(FilterRule::new(kind, comparator, FilterThreshold::Literal(value)))
    }
}

fn invalid(condition: &str, message: &str) -> CoreError {
    CoreError::InvalidCondition {
        condition: condition.to_string(),
        message: message.to_string(),
    }
}
