//! SDK error types

use crate::model::ModelError;
use mocab_runtime::{DataSourceError, RuntimeError};
use thiserror::Error;

/// SDK error type
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Configuration table error
    #[error("Parser error: {0}")]
    ParseError(#[from] mocab_parser::ParseError),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(RuntimeError),

    /// Data source error
    #[error("Data source error: {0}")]
    DataSource(#[from] DataSourceError),

    /// No catalog, transformation or handler for the model
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The model has no training set
    #[error("No training set for model: {0}")]
    NoTrainingSet(String),

    /// Another training run holds the model's lock
    #[error("Training already running for model: {0}")]
    TrainingBusy(String),

    /// Every population export attempt timed out
    #[error("Population export failed after {attempts} attempts: {last}")]
    ExportExhausted { attempts: u32, last: String },

    /// The run was cancelled through its token
    #[error("Training run cancelled: {0}")]
    Cancelled(String),

    /// Model handler failure
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// No data source was configured
    #[error("No clinical data source configured")]
    NoDataSource,

    /// The spawned training task panicked or was aborted
    #[error("Training task failed: {0}")]
    TaskFailed(String),
}

impl From<RuntimeError> for SdkError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::ModelNotFound(model) => SdkError::ModelNotFound(model),
            RuntimeError::DataSource(err) => SdkError::DataSource(err),
            other => SdkError::RuntimeError(other),
        }
    }
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;
