//! MoCab Runtime - Evaluation engine for the MoCab feature pipeline
//!
//! This crate turns raw clinical observations into model inputs:
//! - data set extraction, aggregation and data filters
//! - per-feature resolution against a validity window
//! - the variable graph assembling ordered feature vectors
//! - imputation and training matrix construction
//! - the clinical data source seam

pub mod dataset;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod feature;
pub mod filter;
pub mod imputation;
pub mod training;
pub mod variable;

// Re-export main types
pub use dataset::{Aggregator, DataPoint, DataSet, DataSetExtractor, Observation, Selection};
pub use datasource::{ClinicalDataSource, DataSourceError, InMemoryDataSource, PopulationExport};
pub use engine::ExpressionEvaluator;
pub use error::{Result, RuntimeError};
pub use feature::{FeatureResolver, ResolvedFeatures};
pub use filter::{BoundThreshold, FilterEngine};
pub use imputation::{ImputationEngine, ImputationReport};
pub use training::{TrainingMatrix, TrainingMatrixBuilder, TrainingReport};
pub use variable::{ValueFrame, VariableGraph, VariableRegistry};
