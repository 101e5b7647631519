//! Transformation table parser
//!
//! Parses `transformation.csv` into a [`TransformationTable`]:
//!
//! ```text
//! model,feature,type,formulate,index,role,mandatory
//! qcsi,respiratory_rate,category,0=le|22,1,,
//! qcsi,respiratory_rate,category,1=gt|22&lt|28,1,,
//! diabetes,bmi,formula,[weight] / ([height] / 100) ** 2,6,,true
//! ```
//!
//! Category formulas are parsed with the shared condition grammar and formula
//! expressions are compiled once here. Everything wrong with a row is a load
//! error: an unknown type, a bad condition or comparator, a `[default]` row
//! that is duplicated or not last for its feature, the reserved name `default`.

use crate::csv_table::{non_empty, parse_flag, CsvTable};
use crate::error::{ParseError, Result};
use crate::expression_parser::ExpressionParser;
use mocab_core::ast::{
    ModelTransformation, SlotRole, TransformationRow, TransformationTable, VariableSpec,
    VariableType,
};
use mocab_core::condition::ConditionParser;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const TABLE: &str = "transformation table";

const REQUIRED_COLUMNS: [&str; 4] = ["model", "feature", "type", "formulate"];

/// Feature name reserved for the catch-all category condition
pub const RESERVED_FEATURE: &str = "default";

#[derive(Debug, Deserialize)]
struct TransformationRecord {
    model: String,
    feature: String,
    #[serde(rename = "type")]
    variable_type: String,
    #[serde(default)]
    formulate: String,
    #[serde(default)]
    index: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    mandatory: Option<String>,
}

/// Transformation table parser
pub struct TransformationTableParser;

/// Tracks `[default]` placement per (model, feature)
#[derive(Default)]
struct DefaultTracker {
    closed: HashSet<(String, String)>,
}

impl TransformationTableParser {
    /// Parse a transformation table from CSV text
    pub fn parse(csv_str: &str) -> Result<TransformationTable> {
        let rows = CsvTable::rows::<TransformationRecord>(csv_str, TABLE, &REQUIRED_COLUMNS)?;

        let mut models: HashMap<String, ModelTransformation> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        let mut defaults = DefaultTracker::default();

        for row in rows {
            let record = row.record;
            let parsed = Self::parse_record(&record, &mut defaults)
                .map_err(|e| e.at_row(TABLE, row.line, &record.model, &record.feature))?;

            if !models.contains_key(&record.model) {
                order.push(record.model.clone());
            }
            models
                .entry(record.model.clone())
                .or_insert_with(|| ModelTransformation::new(record.model.clone()))
                .rows
                .push(parsed);
        }

        let mut table = TransformationTable::new();
        for name in order {
            if let Some(model) = models.remove(&name) {
                log::debug!("Model '{}' has {} transformation rows", name, model.rows.len());
                table.insert(model);
            }
        }

        log::info!(
            "Loaded transformation table with {} models",
            table.model_names().len()
        );
        Ok(table)
    }

    /// Parse a transformation table from a file
    pub fn parse_file(path: impl AsRef<Path>) -> Result<TransformationTable> {
        let content = CsvTable::read_file(path)?;
        Self::parse(&content)
    }

    fn parse_record(
        record: &TransformationRecord,
        defaults: &mut DefaultTracker,
    ) -> Result<TransformationRow> {
        if record.model.is_empty() {
            return Err(ParseError::InvalidValue {
                field: "model".to_string(),
                message: "model name is empty".to_string(),
            });
        }
        if record.feature.is_empty() {
            return Err(ParseError::InvalidValue {
                field: "feature".to_string(),
                message: "feature name is empty".to_string(),
            });
        }
        if record.feature == RESERVED_FEATURE {
            return Err(ParseError::ReservedName(record.feature.clone()));
        }

        let variable_type: VariableType = record.variable_type.parse()?;
        let spec = match variable_type {
            VariableType::Numeric => VariableSpec::Numeric,
            VariableType::Category => {
                let rule = ConditionParser::new().parse_category(&record.formulate)?;
                let key = (record.model.clone(), record.feature.clone());
                if defaults.closed.contains(&key) {
                    return Err(if rule.is_default() {
                        ParseError::DuplicateDefault {
                            feature: record.feature.clone(),
                        }
                    } else {
                        ParseError::MisplacedDefault {
                            feature: record.feature.clone(),
                        }
                    });
                }
                if rule.is_default() {
                    defaults.closed.insert(key);
                }
                VariableSpec::Category(rule)
            }
            VariableType::Formula => VariableSpec::Formula {
                expression: ExpressionParser::parse(&record.formulate)?,
                mandatory: parse_flag("mandatory", &record.mandatory)?,
            },
        };

        let index = match non_empty(&record.index) {
            Some(raw) => Some(Self::parse_index(raw)?),
            None => None,
        };

        let role: SlotRole = non_empty(&record.role).unwrap_or("").parse()?;
        if role == SlotRole::Label && index.is_none() {
            return Err(ParseError::InvalidValue {
                field: "role".to_string(),
                message: "label rows need an index".to_string(),
            });
        }

        Ok(TransformationRow {
            feature: record.feature.clone(),
            spec,
            index,
            role,
        })
    }

    fn parse_index(raw: &str) -> Result<usize> {
        match raw.parse::<usize>() {
            Ok(index) if index >= 1 => Ok(index),
            _ => Err(ParseError::InvalidValue {
                field: "index".to_string(),
                message: format!("expected a 1-based slot number, got '{}'", raw),
            }),
        }
    }
}
