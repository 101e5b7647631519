//! Training sets table parser
//!
//! Parses `training_sets.csv` into one [`TrainingSet`] per model:
//!
//! ```text
//! models,filter,duration,null_value_strategy,threshold,validation_method
//! spc,(date)ge|[admission]&(value)ne|0,0001-00-00,(drop)ge|3&(median)|[age]&0,0.4,kfold
//! ```
//!
//! The null value strategy starts with a drop clause `(drop)[comparator|]N`
//! followed by fill clauses `(mean|median|mode)|[column]` or
//! `literal|[column]`; the clause without a column is the default fill.

use crate::csv_table::CsvTable;
use crate::error::{ParseError, Result};
use mocab_core::ast::{
    Comparator, DropRule, FillMethod, NullValueStrategy, TrainingConfig, TrainingSet,
};
use mocab_core::condition::ConditionParser;
use mocab_core::{TimeWindow, Value};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::OnceLock;

const TABLE: &str = "training sets table";

const REQUIRED_COLUMNS: [&str; 4] = ["models", "filter", "duration", "null_value_strategy"];

const SPECIAL_COLUMNS: [&str; 6] = [
    "models",
    "filter",
    "duration",
    "null_value_strategy",
    "threshold",
    "validation_method",
];

/// Decision threshold used when the column is absent or blank
pub const DEFAULT_THRESHOLD: f64 = 0.5;

fn drop_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\(drop\)(?:([a-z]{2})\|)?(\d+)$").expect("drop pattern is a valid regex")
    })
}

fn fill_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:\((median|mean|mode)\)|([\w.+\-]+))(?:\|\[(\w+)\])?$")
            .expect("fill pattern is a valid regex")
    })
}

/// Training sets table parser
pub struct TrainingSetTableParser;

impl TrainingSetTableParser {
    /// Parse training sets from CSV text, keyed by model name
    pub fn parse(csv_str: &str) -> Result<HashMap<String, TrainingSet>> {
        let rows = CsvTable::rows::<HashMap<String, String>>(csv_str, TABLE, &REQUIRED_COLUMNS)?;
        let mut sets = HashMap::new();

        for row in rows {
            let model = row.record.get("models").cloned().unwrap_or_default();
            let set = Self::parse_record(&row.record)
                .map_err(|e| e.at_row(TABLE, row.line, &model, ""))?;

            if sets.contains_key(&set.model) {
                return Err(ParseError::DuplicateModel(set.model).at_row(TABLE, row.line, &model, ""));
            }
            log::debug!(
                "Training set for '{}': {} filter rules, duration {}",
                set.model,
                set.filters.len(),
                set.duration
            );
            sets.insert(set.model.clone(), set);
        }

        log::info!("Loaded {} training sets", sets.len());
        Ok(sets)
    }

    /// Parse training sets from a file
    pub fn parse_file(path: impl AsRef<Path>) -> Result<HashMap<String, TrainingSet>> {
        let content = CsvTable::read_file(path)?;
        Self::parse(&content)
    }

    fn parse_record(record: &HashMap<String, String>) -> Result<TrainingSet> {
        let cell = |column: &str| record.get(column).map(|s| s.trim()).unwrap_or("");

        let model = cell("models");
        if model.is_empty() {
            return Err(ParseError::InvalidValue {
                field: "models".to_string(),
                message: "model name is empty".to_string(),
            });
        }

        let filters = ConditionParser::new().parse_filter(cell("filter"))?;
        let duration = TimeWindow::parse(cell("duration"))?;
        let null_strategy = Self::parse_null_value_strategy(cell("null_value_strategy"))?;

        let threshold = match cell("threshold") {
            "" => DEFAULT_THRESHOLD,
            raw => raw.parse::<f64>().map_err(|_| ParseError::InvalidValue {
                field: "threshold".to_string(),
                message: format!("expected a number, got '{}'", raw),
            })?,
        };

        let validation_method = Some(cell("validation_method"))
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let extras: BTreeMap<String, String> = record
            .iter()
            .filter(|(key, _)| !SPECIAL_COLUMNS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(TrainingSet {
            model: model.to_string(),
            filters,
            duration,
            null_strategy,
            config: TrainingConfig {
                threshold,
                validation_method,
                extras,
            },
        })
    }

    /// Parse a null value strategy cell
    pub fn parse_null_value_strategy(param: &str) -> Result<NullValueStrategy> {
        let param = param.trim();
        let mut clauses = param.split('&').map(str::trim);

        let drop_clause = clauses.next().unwrap_or("");
        let drop = Self::parse_drop_clause(drop_clause)?;

        let mut columns: Vec<(String, FillMethod)> = Vec::new();
        let mut default: Option<FillMethod> = None;

        for clause in clauses {
            let caps = fill_pattern()
                .captures(clause)
                .ok_or_else(|| ParseError::UnknownFillMethod(clause.to_string()))?;

            let method = match (caps.get(1), caps.get(2)) {
                (Some(statistic), _) => Self::statistic(statistic.as_str()),
                (None, Some(token)) => Self::parse_fill_token(token.as_str())?,
                (None, None) => return Err(ParseError::UnknownFillMethod(clause.to_string())),
            };

            match caps.get(3) {
                Some(column) => {
                    let column = column.as_str();
                    if columns.iter().any(|(name, _)| name == column) {
                        return Err(ParseError::DuplicateColumn(column.to_string()));
                    }
                    columns.push((column.to_string(), method));
                }
                None => {
                    if default.is_some() {
                        return Err(ParseError::DuplicateDefaultFill(param.to_string()));
                    }
                    default = Some(method);
                }
            }
        }

        let default = default.ok_or_else(|| ParseError::MissingDefaultFill(param.to_string()))?;

        Ok(NullValueStrategy {
            drop,
            columns,
            default,
        })
    }

    fn parse_drop_clause(clause: &str) -> Result<DropRule> {
        let caps = drop_pattern()
            .captures(clause)
            .ok_or_else(|| ParseError::InvalidDropClause(clause.to_string()))?;

        let comparator = match caps.get(1) {
            Some(m) => m.as_str().parse::<Comparator>()?,
            None => Comparator::Ge,
        };
        let threshold = caps[2]
            .parse::<usize>()
            .map_err(|_| ParseError::InvalidDropClause(clause.to_string()))?;

        let rule = DropRule::new(comparator, threshold);
        if rule.drops(0) {
            return Err(ParseError::DropsCompleteRows(clause.to_string()));
        }
        Ok(rule)
    }

    fn statistic(name: &str) -> FillMethod {
        match name {
            "mean" => FillMethod::Mean,
            "median" => FillMethod::Median,
            _ => FillMethod::Mode,
        }
    }

    /// Bare fill token: a statistic name or a numeric literal
    fn parse_fill_token(token: &str) -> Result<FillMethod> {
        match token {
            "mean" | "median" | "mode" => Ok(Self::statistic(token)),
            _ => match Value::coerce(token) {
                Value::Number(n) => Ok(FillMethod::Constant(n)),
                _ => Err(ParseError::UnknownFillMethod(token.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocab_core::ast::{FilterKind, FilterThreshold};

    #[test]
    fn test_parse_null_value_strategy() {
        let strategy = TrainingSetTableParser::parse_null_value_strategy(
            "(drop)gt|2&(median)|[age]&0|[smoker]&(mean)",
        )
        .unwrap();

        assert_eq!(strategy.drop, DropRule::new(Comparator::Gt, 2));
        assert_eq!(
            strategy.columns,
            vec![
                ("age".to_string(), FillMethod::Median),
                ("smoker".to_string(), FillMethod::Constant(0.0)),
            ]
        );
        assert_eq!(strategy.default, FillMethod::Mean);
    }

    #[test]
    fn test_drop_defaults_to_ge() {
        let strategy = TrainingSetTableParser::parse_null_value_strategy("(drop)3&-1.5").unwrap();
        assert_eq!(strategy.drop, DropRule::new(Comparator::Ge, 3));
        assert_eq!(strategy.default, FillMethod::Constant(-1.5));
    }

    #[test]
    fn test_bare_statistic_names() {
        let strategy = TrainingSetTableParser::parse_null_value_strategy("(drop)ge|3&mode").unwrap();
        assert_eq!(strategy.default, FillMethod::Mode);
    }

    #[test]
    fn test_null_value_strategy_errors() {
        let parse = TrainingSetTableParser::parse_null_value_strategy;

        assert!(matches!(parse("(mean)"), Err(ParseError::InvalidDropClause(_))));
        assert!(matches!(parse("(drop)ge|0&0"), Err(ParseError::DropsCompleteRows(_))));
        assert!(matches!(parse("(drop)le|2&0"), Err(ParseError::DropsCompleteRows(_))));
        assert!(matches!(parse("(drop)ge|3"), Err(ParseError::MissingDefaultFill(_))));
        assert!(matches!(parse("(drop)ge|3&0&1"), Err(ParseError::DuplicateDefaultFill(_))));
        assert!(matches!(
            parse("(drop)ge|3&0|[age]&1|[age]&0"),
            Err(ParseError::DuplicateColumn(_))
        ));
        assert!(matches!(parse("(drop)ge|3&(average)"), Err(ParseError::UnknownFillMethod(_))));
        assert!(matches!(parse("(drop)ge|3&zero"), Err(ParseError::UnknownFillMethod(_))));
    }

    #[test]
    fn test_parse_training_sets() {
        let csv = "\
models,filter,duration,null_value_strategy,threshold,validation_method,n_estimators
spc,(date)ge|[admission]&(value)ne|0,0001-00-00,(drop)ge|3&(median)|[age]&0,0.4,kfold,200
qcsi,,0000-06-00,(drop)ge|2&(mean),,,
";
        let sets = TrainingSetTableParser::parse(csv).unwrap();
        assert_eq!(sets.len(), 2);

        let spc = &sets["spc"];
        assert_eq!(spc.filters.len(), 2);
        assert_eq!(spc.filters[0].kind, FilterKind::Date);
        assert_eq!(
            spc.filters[0].threshold,
            FilterThreshold::Reference("admission".to_string())
        );
        assert_eq!(spc.duration.years, 1);
        assert_eq!(spc.config.threshold, 0.4);
        assert_eq!(spc.config.validation_method.as_deref(), Some("kfold"));
        assert_eq!(spc.config.extras.get("n_estimators").map(String::as_str), Some("200"));

        let qcsi = &sets["qcsi"];
        assert!(qcsi.filters.is_empty());
        assert_eq!(qcsi.config.threshold, DEFAULT_THRESHOLD);
        assert!(qcsi.config.validation_method.is_none());
    }

    #[test]
    fn test_nan_filter_threshold_fails_at_load() {
        let csv = "\
models,filter,duration,null_value_strategy
spc,(value)gt|nan,0001-00-00,(drop)ge|3&0
";
        assert!(TrainingSetTableParser::parse(csv).is_err());
    }

    #[test]
    fn test_duplicate_model() {
        let csv = "\
models,filter,duration,null_value_strategy
spc,,0001-00-00,(drop)ge|3&0
spc,,0001-00-00,(drop)ge|3&0
";
        let err = TrainingSetTableParser::parse(csv).unwrap_err();
        assert!(matches!(err.root(), ParseError::DuplicateModel(_)));
    }
}
