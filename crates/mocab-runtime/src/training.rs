//! Training matrix builder
//!
//! Turns a population export into a cleaned patient × feature matrix:
//! observations are allocated to the model's features, resolved with the
//! training set's data filter and duration, transformed into input and label
//! vectors, and finally cleaned by the imputation engine. Patients without a
//! complete label vector are left out of the matrix.

use crate::dataset::{DataSetExtractor, Observation};
use crate::error::{Result, RuntimeError};
use crate::feature::FeatureResolver;
use crate::imputation::{ImputationEngine, ImputationReport};
use crate::variable::VariableRegistry;
use chrono::NaiveDateTime;
use mocab_core::ast::{ModelFeatures, TrainingSet};
use mocab_core::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Cleaned training matrix of one model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingMatrix {
    pub columns: Vec<String>,
    pub label_columns: Vec<String>,
    /// Patient of each row
    pub patient_ids: Vec<String>,
    pub x: Vec<Vec<Value>>,
    pub y: Vec<Vec<Value>>,
}

impl TrainingMatrix {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Numeric view of the inputs; cells left null become NaN
    pub fn x_f64(&self) -> Vec<Vec<f64>> {
        to_f64(&self.x)
    }

    pub fn y_f64(&self) -> Vec<Vec<f64>> {
        to_f64(&self.y)
    }
}

fn to_f64(rows: &[Vec<Value>]) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|row| row.iter().map(|v| v.as_f64().unwrap_or(f64::NAN)).collect())
        .collect()
}

/// Counters of one matrix build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrainingReport {
    pub patients: usize,
    /// Patients dropped for a missing label
    pub missing_labels: usize,
    /// Patients dropped for a failing mandatory formula
    pub failed: usize,
    pub imputation: ImputationReport,
}

impl TrainingReport {
    /// Every patient left out of the matrix
    pub fn dropped(&self) -> usize {
        self.missing_labels + self.failed + self.imputation.dropped_rows
    }
}

/// Builds training matrices for one model and training set
pub struct TrainingMatrixBuilder<'a> {
    features: &'a ModelFeatures,
    registry: &'a VariableRegistry,
    training: &'a TrainingSet,
}

impl<'a> TrainingMatrixBuilder<'a> {
    pub fn new(
        features: &'a ModelFeatures,
        registry: &'a VariableRegistry,
        training: &'a TrainingSet,
    ) -> Self {
        Self {
            features,
            registry,
            training,
        }
    }

    /// Input and label vectors of one patient.
    ///
    /// Returns `None` when a label resolves to null.
    pub fn patient_row(
        &self,
        observations: &[Observation],
        reference: NaiveDateTime,
    ) -> Result<Option<(Vec<Value>, Vec<Value>)>> {
        let allocated = DataSetExtractor::allocate(self.features, observations);
        let resolved = FeatureResolver::new(self.features)
            .with_filters(&self.training.filters)
            .with_window(self.training.duration)
            .resolve(&allocated, reference);

        let values = resolved.values();
        let y = self.registry.resolve_labels(&values)?;
        if y.iter().any(Value::is_null) {
            return Ok(None);
        }
        let x = self.registry.resolve(&values)?;
        Ok(Some((x, y)))
    }

    /// Build the cleaned matrix of a population
    pub fn build(
        &self,
        patients: &BTreeMap<String, Vec<Observation>>,
        reference: NaiveDateTime,
    ) -> Result<(TrainingMatrix, TrainingReport)> {
        self.build_until(patients, reference, || false)?
            .ok_or_else(|| RuntimeError::InvalidOperation("matrix build stopped".to_string()))
    }

    /// Build the cleaned matrix, polling `stop` between patients.
    ///
    /// Returns `None` as soon as `stop` answers true.
    pub fn build_until<F>(
        &self,
        patients: &BTreeMap<String, Vec<Observation>>,
        reference: NaiveDateTime,
        stop: F,
    ) -> Result<Option<(TrainingMatrix, TrainingReport)>>
    where
        F: Fn() -> bool,
    {
        let mut matrix = TrainingMatrix {
            columns: self.registry.columns(),
            label_columns: self.registry.label_columns(),
            ..TrainingMatrix::default()
        };
        let mut report = TrainingReport {
            patients: patients.len(),
            ..TrainingReport::default()
        };

        for (patient_id, observations) in patients {
            if stop() {
                debug!("Matrix build for '{}' stopped", self.registry.model());
                return Ok(None);
            }
            match self.patient_row(observations, reference) {
                Ok(Some((x, y))) => {
                    matrix.patient_ids.push(patient_id.clone());
                    matrix.x.push(x);
                    matrix.y.push(y);
                }
                Ok(None) => {
                    debug!("Patient '{}' has no label, dropped", patient_id);
                    report.missing_labels += 1;
                }
                Err(err @ RuntimeError::MandatoryFormula { .. }) => {
                    warn!("Patient '{}' dropped: {}", patient_id, err);
                    report.failed += 1;
                }
                Err(err) => return Err(err),
            }
        }

        report.imputation = self.clean(&mut matrix);

        info!(
            "Training matrix for '{}': {} rows x {} columns ({} patients dropped)",
            self.registry.model(),
            matrix.len(),
            matrix.columns.len(),
            report.dropped()
        );
        Ok(Some((matrix, report)))
    }

    fn clean(&self, matrix: &mut TrainingMatrix) -> ImputationReport {
        let engine = ImputationEngine::new(&self.training.null_strategy);
        let mask = engine.drop_mask(&matrix.x);

        let mut keep = mask.iter().map(|drop| !drop);
        matrix.x.retain(|_| keep.next().unwrap_or(true));
        let mut keep = mask.iter().map(|drop| !drop);
        matrix.y.retain(|_| keep.next().unwrap_or(true));
        let mut keep = mask.iter().map(|drop| !drop);
        matrix.patient_ids.retain(|_| keep.next().unwrap_or(true));

        let dropped_rows = mask.iter().filter(|drop| **drop).count();
        let filled_cells = engine.fill(&matrix.columns, &mut matrix.x);
        ImputationReport {
            dropped_rows,
            filled_cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocab_core::ast::{
        CodeRef, Comparator, DataKind, DropRule, FeatureDefinition, FillMethod, FilterKind,
        FilterRule, FilterThreshold, ModelTransformation, NullValueStrategy, SlotRole,
        TrainingConfig, TransformationRow, VariableSpec,
    };
    use mocab_core::{parse_timestamp, TimeWindow};

    fn features() -> ModelFeatures {
        let mut model = ModelFeatures::new("sepsis");
        for (name, code) in [("lactate", "2524-7"), ("wbc", "6690-2"), ("outcome", "sepsis")] {
            model.features.push(
                FeatureDefinition::new(name, DataKind::Value, TimeWindow::years(1))
                    .with_code(CodeRef::new(code)),
            );
        }
        model
    }

    fn registry() -> VariableRegistry {
        let mut transformation = ModelTransformation::new("sepsis");
        transformation
            .rows
            .push(TransformationRow::new("lactate", VariableSpec::Numeric).at(1));
        transformation
            .rows
            .push(TransformationRow::new("wbc", VariableSpec::Numeric).at(2));
        transformation.rows.push(
            TransformationRow::new("outcome", VariableSpec::Numeric)
                .at(1)
                .with_role(SlotRole::Label),
        );
        VariableRegistry::build(&transformation)
    }

    fn training(drop: DropRule, duration: TimeWindow) -> TrainingSet {
        TrainingSet {
            model: "sepsis".to_string(),
            filters: vec![FilterRule::new(
                FilterKind::Value,
                Comparator::Ge,
                FilterThreshold::Literal(Value::Number(0.0)),
            )],
            duration,
            null_strategy: NullValueStrategy {
                drop,
                columns: vec![("wbc".to_string(), FillMethod::Median)],
                default: FillMethod::Constant(1.0),
            },
            config: TrainingConfig::default(),
        }
    }

    fn obs(code: &str, date: &str, value: f64) -> Observation {
        Observation::new(Some(date), value).with_code(code)
    }

    fn population() -> BTreeMap<String, Vec<Observation>> {
        BTreeMap::from([
            (
                "a".to_string(),
                vec![
                    obs("2524-7", "2020-05-01", 2.5),
                    obs("6690-2", "2020-05-01", 9000.0),
                    obs("sepsis", "2020-05-02", 1.0),
                ],
            ),
            (
                "b".to_string(),
                vec![obs("2524-7", "2020-05-01", 1.1), obs("sepsis", "2020-05-02", 0.0)],
            ),
            (
                "c".to_string(),
                vec![obs("2524-7", "2020-05-01", 4.0), obs("6690-2", "2020-05-01", 15000.0)],
            ),
            (
                "d".to_string(),
                vec![obs("6690-2", "2020-05-01", 11000.0), obs("sepsis", "2020-05-02", 1.0)],
            ),
        ])
    }

    fn reference() -> NaiveDateTime {
        parse_timestamp("2020-06-01").unwrap()
    }

    #[test]
    fn test_build_matrix() {
        let features = features();
        let registry = registry();
        let training = training(DropRule::new(Comparator::Ge, 2), TimeWindow::years(1));

        let (matrix, report) = TrainingMatrixBuilder::new(&features, &registry, &training)
            .build(&population(), reference())
            .unwrap();

        assert_eq!(matrix.columns, vec!["lactate", "wbc"]);
        assert_eq!(matrix.label_columns, vec!["outcome"]);
        // c has no label
        assert_eq!(matrix.patient_ids, vec!["a", "b", "d"]);
        assert_eq!(report.missing_labels, 1);
        assert_eq!(report.dropped(), 1);

        // b's wbc is the median of 9000 and 11000; d's lactate the default fill
        assert_eq!(matrix.x[1], vec![Value::Number(1.1), Value::Number(10000.0)]);
        assert_eq!(matrix.x[2], vec![Value::Number(1.0), Value::Number(11000.0)]);
        assert_eq!(matrix.y_f64(), vec![vec![1.0], vec![0.0], vec![1.0]]);
    }

    #[test]
    fn test_build_stops_when_asked() {
        let features = features();
        let registry = registry();
        let training = training(DropRule::new(Comparator::Ge, 2), TimeWindow::years(1));
        let visited = std::cell::Cell::new(0);

        let outcome = TrainingMatrixBuilder::new(&features, &registry, &training)
            .build_until(&population(), reference(), || {
                visited.set(visited.get() + 1);
                visited.get() > 2
            })
            .unwrap();

        assert!(outcome.is_none());
        assert_eq!(visited.get(), 3);
    }

    #[test]
    fn test_drop_rule_keeps_alignment() {
        let features = features();
        let registry = registry();
        let training = training(DropRule::new(Comparator::Ge, 1), TimeWindow::years(1));

        let (matrix, report) = TrainingMatrixBuilder::new(&features, &registry, &training)
            .build(&population(), reference())
            .unwrap();

        assert_eq!(matrix.patient_ids, vec!["a"]);
        assert_eq!(matrix.y, vec![vec![Value::Number(1.0)]]);
        assert_eq!(report.imputation.dropped_rows, 2);
        assert_eq!(report.dropped(), 3);
    }

    #[test]
    fn test_duration_overrides_feature_windows() {
        let features = features();
        let registry = registry();
        let training = training(DropRule::new(Comparator::Ge, 3), TimeWindow::days(10));

        let (matrix, _) = TrainingMatrixBuilder::new(&features, &registry, &training)
            .build(&population(), reference())
            .unwrap();

        // every observation is older than ten days, so no label survives
        assert!(matrix.is_empty());
    }

    #[test]
    fn test_unfiltered_value_is_excluded() {
        let features = features();
        let registry = registry();
        let training = training(DropRule::new(Comparator::Ge, 3), TimeWindow::years(1));
        let observations = vec![obs("2524-7", "2020-05-01", -3.0), obs("sepsis", "2020-05-02", 0.0)];

        let (x, y) = TrainingMatrixBuilder::new(&features, &registry, &training)
            .patient_row(&observations, reference())
            .unwrap()
            .unwrap();
        assert_eq!(x, vec![Value::Null, Value::Null]);
        assert_eq!(y, vec![Value::Number(0.0)]);
    }
}
