//! Builder pattern for MocabEngine

use crate::config::EngineConfig;
use crate::engine::MocabEngine;
use crate::error::Result;
use crate::model::{ModelRegistry, ModelRuntime};
use mocab_parser::{FeatureTableParser, TrainingSetTableParser, TransformationTableParser};
use mocab_runtime::{ClinicalDataSource, VariableGraph};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Builder for MocabEngine
///
/// # Example
///
/// ```rust,ignore
/// use mocab_sdk::{EngineConfig, MocabEngineBuilder, ScoreSumModel};
///
/// // From the table paths of the loaded configuration
/// let engine = MocabEngineBuilder::from_config(EngineConfig::load()?)
///     .with_model("qcsi", Arc::new(ScoreSumModel::new("qcsi")))
///     .build()?;
///
/// // Inline tables (for testing)
/// let engine = MocabEngineBuilder::new()
///     .with_features_content(features_csv)
///     .with_transformation_content(transformation_csv)
///     .build()?;
/// ```
pub struct MocabEngineBuilder {
    config: EngineConfig,
    features_content: Option<String>,
    transformation_content: Option<String>,
    training_sets_content: Option<String>,
    data_source: Option<Arc<dyn ClinicalDataSource>>,
    models: ModelRegistry,
}

impl MocabEngineBuilder {
    /// Create a new builder with the default configuration
    pub fn new() -> Self {
        Self::from_config(EngineConfig::default())
    }

    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            config,
            features_content: None,
            transformation_content: None,
            training_sets_content: None,
            data_source: None,
            models: ModelRegistry::new(),
        }
    }

    /// Feature catalog CSV (alternative to the configured path)
    pub fn with_features_content(mut self, content: impl Into<String>) -> Self {
        self.features_content = Some(content.into());
        self
    }

    /// Transformation CSV (alternative to the configured path)
    pub fn with_transformation_content(mut self, content: impl Into<String>) -> Self {
        self.transformation_content = Some(content.into());
        self
    }

    /// Training set CSV (alternative to the configured path)
    pub fn with_training_sets_content(mut self, content: impl Into<String>) -> Self {
        self.training_sets_content = Some(content.into());
        self
    }

    pub fn with_data_source(mut self, source: Arc<dyn ClinicalDataSource>) -> Self {
        self.data_source = Some(source);
        self
    }

    /// Register the scoring handler of a model
    pub fn with_model(mut self, model: impl Into<String>, handler: Arc<dyn ModelRuntime>) -> Self {
        self.models.register(model, handler);
        self
    }

    /// Load every table and build the engine
    pub fn build(self) -> Result<MocabEngine> {
        let catalog = match &self.features_content {
            Some(content) => FeatureTableParser::parse(content)?,
            None => FeatureTableParser::parse_file(&self.config.features_table)?,
        };

        let transformation = match &self.transformation_content {
            Some(content) => TransformationTableParser::parse(content)?,
            None => TransformationTableParser::parse_file(&self.config.transformation_table)?,
        };

        let training_sets = match (&self.training_sets_content, &self.config.training_sets_table) {
            (Some(content), _) => TrainingSetTableParser::parse(content)?,
            (None, Some(path)) if path.exists() => TrainingSetTableParser::parse_file(path)?,
            (None, Some(path)) => {
                warn!("Training set table {} not found, training disabled", path.display());
                HashMap::new()
            }
            (None, None) => HashMap::new(),
        };

        let graph = VariableGraph::build(&transformation);

        for model in graph.model_names() {
            if !catalog.contains_model(model) {
                warn!("Model '{}' has transformation rows but no catalog features", model);
            }
        }
        for model in training_sets.keys() {
            if !graph.contains(model) {
                warn!("Training set for unknown model '{}'", model);
            }
        }

        info!(
            "Engine ready: {} models, {} training sets, {} handlers",
            graph.model_names().len(),
            training_sets.len(),
            self.models.len()
        );

        Ok(MocabEngine {
            config: self.config,
            catalog,
            graph,
            training_sets,
            models: self.models,
            data_source: self.data_source,
        })
    }
}

impl Default for MocabEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
