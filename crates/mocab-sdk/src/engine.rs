//! MocabEngine - inference and training facade

use crate::config::EngineConfig;
use crate::error::{Result, SdkError};
use crate::model::ModelRegistry;
use chrono::NaiveDateTime;
use mocab_core::ast::{FeatureCatalog, ModelFeatures, TrainingSet};
use mocab_core::Value;
use mocab_runtime::{
    ClinicalDataSource, DataSetExtractor, FeatureResolver, Observation, TrainingMatrix,
    TrainingMatrixBuilder, TrainingReport, VariableGraph, VariableRegistry,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Score of one patient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub model: String,
    pub patient_id: String,
    /// Feature vector the score was computed from
    pub features: Vec<Value>,
    pub score: f64,
}

/// Engine over the loaded configuration tables.
///
/// Everything held here is read-only after construction, so one engine is
/// shared by concurrent inference calls and training runs.
pub struct MocabEngine {
    pub(crate) config: EngineConfig,
    pub(crate) catalog: FeatureCatalog,
    pub(crate) graph: VariableGraph,
    pub(crate) training_sets: HashMap<String, TrainingSet>,
    pub(crate) models: ModelRegistry,
    pub(crate) data_source: Option<Arc<dyn ClinicalDataSource>>,
}

impl MocabEngine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Models with both a catalog and a transformation
    pub fn model_names(&self) -> Vec<&str> {
        self.graph
            .model_names()
            .into_iter()
            .filter(|name| self.catalog.contains_model(name))
            .collect()
    }

    /// Input column names of a model
    pub fn columns(&self, model: &str) -> Result<Vec<String>> {
        Ok(self.registry(model)?.columns())
    }

    pub fn training_set(&self, model: &str) -> Result<&TrainingSet> {
        self.training_sets
            .get(model)
            .ok_or_else(|| SdkError::NoTrainingSet(model.to_string()))
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn data_source(&self) -> Result<Arc<dyn ClinicalDataSource>> {
        self.data_source.clone().ok_or(SdkError::NoDataSource)
    }

    fn features(&self, model: &str) -> Result<&ModelFeatures> {
        self.catalog
            .model(model)
            .ok_or_else(|| SdkError::ModelNotFound(model.to_string()))
    }

    fn registry(&self, model: &str) -> Result<Arc<VariableRegistry>> {
        Ok(self.graph.model(model)?)
    }

    /// Resolve the feature vector of one patient from raw coded observations
    pub fn resolve_feature_vector(
        &self,
        observations: &[Observation],
        model: &str,
        reference: NaiveDateTime,
    ) -> Result<Vec<Value>> {
        let features = self.features(model)?;
        let registry = self.registry(model)?;

        let allocated = DataSetExtractor::allocate(features, observations);
        let resolved = FeatureResolver::new(features).resolve(&allocated, reference);
        debug!("Resolved {} features for '{}'", resolved.len(), model);

        Ok(registry.resolve(&resolved.values())?)
    }

    /// Resolve the feature vector from already selected feature values
    pub fn resolve_values(&self, values: &HashMap<String, Value>, model: &str) -> Result<Vec<Value>> {
        Ok(self.registry(model)?.resolve(values)?)
    }

    /// Build the cleaned training matrix of a population.
    ///
    /// Returns the matrix and the number of patients left out of it.
    pub fn build_training_matrix(
        &self,
        patients: &BTreeMap<String, Vec<Observation>>,
        model: &str,
        reference: NaiveDateTime,
    ) -> Result<(TrainingMatrix, usize)> {
        let (matrix, report) = self
            .training_matrix_until(patients, model, reference, || false)?
            .ok_or_else(|| SdkError::Cancelled(model.to_string()))?;
        Ok((matrix, report.dropped()))
    }

    pub(crate) fn training_matrix_until<F>(
        &self,
        patients: &BTreeMap<String, Vec<Observation>>,
        model: &str,
        reference: NaiveDateTime,
        stop: F,
    ) -> Result<Option<(TrainingMatrix, TrainingReport)>>
    where
        F: Fn() -> bool,
    {
        let features = self.features(model)?;
        let registry = self.registry(model)?;
        let training = self.training_set(model)?;

        Ok(TrainingMatrixBuilder::new(features, &registry, training).build_until(
            patients,
            reference,
            stop,
        )?)
    }

    /// Fetch a patient's observations from the data source and score them
    pub async fn predict_for_patient(
        &self,
        patient_id: &str,
        model: &str,
        reference: NaiveDateTime,
    ) -> Result<Prediction> {
        let features = self.features(model)?;
        let registry = self.registry(model)?;
        let handler = self
            .models
            .get(model)
            .ok_or_else(|| SdkError::ModelNotFound(model.to_string()))?;
        let source = self.data_source()?;

        let mut observations: HashMap<String, Vec<Observation>> = HashMap::new();
        for feature in features.iter() {
            let since = DataSetExtractor::lower_bound(&feature.window, reference);
            let found = source.search(patient_id, feature, since).await?;
            if !found.is_empty() {
                observations.insert(feature.name.clone(), found);
            }
        }

        let resolved = FeatureResolver::new(features).resolve(&observations, reference);
        let vector = registry.resolve(&resolved.values())?;
        let score = handler.predict(&vector)?;

        info!("Patient '{}' scored {} on '{}'", patient_id, score, model);
        Ok(Prediction {
            model: model.to_string(),
            patient_id: patient_id.to_string(),
            features: vector,
            score,
        })
    }
}
