//! Model handlers
//!
//! Scoring and fitting sit behind [`ModelRuntime`]. Handlers are registered
//! by model name at startup; nothing is looked up by reflection.

use chrono::{DateTime, Utc};
use mocab_core::ast::TrainingConfig;
use mocab_core::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Model handler failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid model input: {0}")]
    InvalidInput(String),

    #[error("Training failed: {0}")]
    Training(String),
}

/// Parameters produced by one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedArtifact {
    pub model: String,
    pub trained_at: DateTime<Utc>,
    /// Rows the artifact was fitted on
    pub rows: usize,
    pub threshold: f64,
    pub parameters: BTreeMap<String, f64>,
}

/// Scoring and fitting of one model
pub trait ModelRuntime: Send + Sync {
    /// Score one feature vector
    fn predict(&self, input: &[Value]) -> Result<f64, ModelError>;

    /// Fit on a cleaned matrix; `y` holds one label vector per row
    fn fit(
        &self,
        x: &[Vec<f64>],
        y: &[Vec<f64>],
        config: &TrainingConfig,
    ) -> Result<TrainedArtifact, ModelError>;
}

/// Model handlers keyed by model name
#[derive(Clone, Default)]
pub struct ModelRegistry {
    handlers: HashMap<String, Arc<dyn ModelRuntime>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: impl Into<String>, handler: Arc<dyn ModelRuntime>) {
        self.handlers.insert(model.into(), handler);
    }

    pub fn get(&self, model: &str) -> Option<Arc<dyn ModelRuntime>> {
        self.handlers.get(model).cloned()
    }

    pub fn contains(&self, model: &str) -> bool {
        self.handlers.contains_key(model)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("ModelRegistry").field("models", &names).finish()
    }
}

/// Points-based score: the sum of the slot values.
///
/// Fitting learns nothing but the score distribution and the cut-off that
/// best separates the first label column.
#[derive(Debug, Clone)]
pub struct ScoreSumModel {
    name: String,
}

impl ScoreSumModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ModelRuntime for ScoreSumModel {
    fn predict(&self, input: &[Value]) -> Result<f64, ModelError> {
        input.iter().enumerate().try_fold(0.0, |sum, (index, value)| {
            value.as_f64().map(|v| sum + v).ok_or_else(|| {
                ModelError::InvalidInput(format!(
                    "{}: slot {} holds {}",
                    self.name,
                    index + 1,
                    value.type_name()
                ))
            })
        })
    }

    fn fit(
        &self,
        x: &[Vec<f64>],
        y: &[Vec<f64>],
        config: &TrainingConfig,
    ) -> Result<TrainedArtifact, ModelError> {
        if x.is_empty() {
            return Err(ModelError::Training(format!("{}: empty training matrix", self.name)));
        }
        if x.len() != y.len() {
            return Err(ModelError::Training(format!(
                "{}: {} input rows for {} label rows",
                self.name,
                x.len(),
                y.len()
            )));
        }

        let scores: Vec<f64> = x
            .iter()
            .map(|row| row.iter().filter(|v| v.is_finite()).sum())
            .collect();
        let labels: Vec<bool> = y
            .iter()
            .map(|row| row.first().map(|v| *v >= config.threshold).unwrap_or(false))
            .collect();

        let rows = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / rows;
        let prevalence = labels.iter().filter(|l| **l).count() as f64 / rows;

        let mut candidates = scores.clone();
        candidates.sort_by(f64::total_cmp);
        candidates.dedup();
        let (cutoff, accuracy) = candidates
            .iter()
            .map(|cutoff| {
                let correct = scores
                    .iter()
                    .zip(&labels)
                    .filter(|(score, label)| (**score >= *cutoff) == **label)
                    .count();
                (*cutoff, correct as f64 / rows)
            })
            .fold((f64::NAN, -1.0), |best, candidate| {
                if candidate.1 > best.1 {
                    candidate
                } else {
                    best
                }
            });

        Ok(TrainedArtifact {
            model: self.name.clone(),
            trained_at: Utc::now(),
            rows: scores.len(),
            threshold: config.threshold,
            parameters: BTreeMap::from([
                ("mean_score".to_string(), mean),
                ("prevalence".to_string(), prevalence),
                ("cutoff".to_string(), cutoff),
                ("accuracy".to_string(), accuracy),
            ]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_sum_predict() {
        let model = ScoreSumModel::new("qcsi");
        let score = model
            .predict(&[Value::Number(1.0), Value::Number(2.0), Value::Number(4.0)])
            .unwrap();
        assert_eq!(score, 7.0);

        let err = model.predict(&[Value::Number(1.0), Value::Null]).unwrap_err();
        assert!(err.to_string().contains("slot 2"));
    }

    #[test]
    fn test_score_sum_fit_finds_cutoff() {
        let model = ScoreSumModel::new("qcsi");
        let x = vec![
            vec![0.0, 0.0, 0.0],
            vec![1.0, 0.0, 0.0],
            vec![2.0, 5.0, 5.0],
            vec![1.0, 2.0, 4.0],
        ];
        let y = vec![vec![0.0], vec![0.0], vec![1.0], vec![1.0]];

        let artifact = model.fit(&x, &y, &TrainingConfig::default()).unwrap();
        assert_eq!(artifact.rows, 4);
        assert_eq!(artifact.parameters["cutoff"], 7.0);
        assert_eq!(artifact.parameters["accuracy"], 1.0);
        assert_eq!(artifact.parameters["prevalence"], 0.5);
    }

    #[test]
    fn test_fit_rejects_empty_matrix() {
        let model = ScoreSumModel::new("qcsi");
        assert!(matches!(
            model.fit(&[], &[], &TrainingConfig::default()),
            Err(ModelError::Training(_))
        ));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ModelRegistry::new();
        registry.register("qcsi", Arc::new(ScoreSumModel::new("qcsi")));
        assert!(registry.contains("qcsi"));
        assert!(registry.get("nsti").is_none());
        assert_eq!(registry.len(), 1);
    }
}
