//! Feature table parser
//!
//! Parses `features.csv` into a [`FeatureCatalog`]:
//!
//! ```text
//! model,feature,type_of_data,code,code_system,data_alive_time,default_value,search_type,snapshot
//! diabetes,glucose,value,2339-0,http://loinc.org,0000-06-00T00:00:00,,latest,
//! ```
//!
//! Repeated (model, feature) rows accumulate codes. A `code` cell may hold
//! several comma-joined codes, each optionally written `system|code`.

use crate::csv_table::{non_empty, parse_flag, CsvTable};
use crate::error::{ParseError, Result};
use mocab_core::ast::{CodeRef, DataKind, FeatureCatalog, FeatureDefinition, ModelFeatures, SearchStrategy};
use mocab_core::{TimeWindow, Value};
use serde::Deserialize;
use std::path::Path;

const TABLE: &str = "feature table";

const REQUIRED_COLUMNS: [&str; 5] = ["model", "feature", "type_of_data", "code", "data_alive_time"];

#[derive(Debug, Deserialize)]
struct FeatureRecord {
    model: String,
    feature: String,
    type_of_data: String,
    code: String,
    #[serde(default)]
    code_system: Option<String>,
    data_alive_time: String,
    #[serde(default)]
    default_value: Option<String>,
    #[serde(default)]
    search_type: Option<String>,
    #[serde(default)]
    snapshot: Option<String>,
}

/// Feature table parser
pub struct FeatureTableParser;

impl FeatureTableParser {
    /// Parse a feature catalog from CSV text
    pub fn parse(csv_str: &str) -> Result<FeatureCatalog> {
        let rows = CsvTable::rows::<FeatureRecord>(csv_str, TABLE, &REQUIRED_COLUMNS)?;
        let mut catalog = FeatureCatalog::new();

        for row in rows {
            let record = row.record;
            Self::apply_record(&mut catalog, &record)
                .map_err(|e| e.at_row(TABLE, row.line, &record.model, &record.feature))?;
        }

        log::info!(
            "Loaded feature catalog with {} models",
            catalog.model_names().len()
        );
        Ok(catalog)
    }

    /// Parse a feature catalog from a file
    pub fn parse_file(path: impl AsRef<Path>) -> Result<FeatureCatalog> {
        let content = CsvTable::read_file(path)?;
        Self::parse(&content)
    }

    fn apply_record(catalog: &mut FeatureCatalog, record: &FeatureRecord) -> Result<()> {
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

        let codes = Self::parse_codes(&record.code, non_empty(&record.code_system))?;

        if !catalog.contains_model(&record.model) {
            catalog.insert(ModelFeatures::new(record.model.clone()));
        }
        let model = catalog
            .model_mut(&record.model)
            .ok_or_else(|| ParseError::InvalidValue {
                field: "model".to_string(),
                message: format!("model '{}' could not be registered", record.model),
            })?;

        if let Some(existing) = model.get_mut(&record.feature) {
            log::debug!(
                "Accumulating {} codes into {}.{}",
                codes.len(),
                record.model,
                record.feature
            );
            for code in codes {
                if !existing.codes.contains(&code) {
                    existing.codes.push(code);
                }
            }
            return Ok(());
        }

        let kind: DataKind = record.type_of_data.parse()?;
        let window = TimeWindow::parse(&record.data_alive_time)?;
        let search: SearchStrategy = non_empty(&record.search_type).unwrap_or("").parse()?;
        let snapshot = parse_flag("snapshot", &record.snapshot)?;
        let default_value = non_empty(&record.default_value)
            .map(Value::coerce)
            .unwrap_or(Value::Null);

        let mut feature = FeatureDefinition::new(record.feature.clone(), kind, window)
            .with_default(default_value)
            .with_search(search)
            .with_snapshot(snapshot);
        feature.codes = codes;
        model.features.push(feature);

        Ok(())
    }

    /// Split a `code` cell into code references
    fn parse_codes(cell: &str, default_system: Option<&str>) -> Result<Vec<CodeRef>> {
        let mut codes = Vec::new();

        for token in cell.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let code = match token.rsplit_once('|') {
                Some((system, code)) if !code.trim().is_empty() => {
                    CodeRef::with_system(code.trim(), system.trim())
                }
                Some(_) => {
                    return Err(ParseError::InvalidValue {
                        field: "code".to_string(),
                        message: format!("code missing after system in '{}'", token),
                    })
                }
                None => match default_system {
                    Some(system) => CodeRef::with_system(token, system),
                    None => CodeRef::new(token),
                },
            };
            codes.push(code);
        }

        if codes.is_empty() {
            return Err(ParseError::InvalidValue {
                field: "code".to_string(),
                message: "at least one code is required".to_string(),
            });
        }

        Ok(codes)
    }
}
