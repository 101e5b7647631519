//! MoCab SDK
//!
//! High-level API over the MoCab feature pipeline: loads the configuration
//! tables, resolves feature vectors for inference and coordinates training
//! runs against a clinical data source.

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod training;

// Re-export main types
pub use builder::MocabEngineBuilder;
pub use config::{EngineConfig, ExportConfig};
pub use engine::{MocabEngine, Prediction};
pub use error::{Result, SdkError};
pub use model::{ModelError, ModelRegistry, ModelRuntime, ScoreSumModel, TrainedArtifact};
pub use training::{
    CancellationToken, ExportPolicy, TrainingCoordinator, TrainingOutcome, TrainingTicket,
};

// Re-export commonly used types from dependencies
pub use mocab_core::{parse_timestamp, Value};
pub use mocab_runtime::{
    ClinicalDataSource, DataSourceError, InMemoryDataSource, Observation, PopulationExport,
    TrainingMatrix,
};
