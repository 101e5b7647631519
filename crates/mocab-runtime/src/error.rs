//! Runtime error types

use crate::datasource::DataSourceError;
use thiserror::Error;

/// Runtime error
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No transformation or catalog entry for the model
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// A mandatory formula could not be evaluated
    #[error("Mandatory formula '{feature}' failed: {reason}")]
    MandatoryFormula { feature: String, reason: String },

    /// Referenced variable holds no value
    #[error("Missing value for variable: {0}")]
    MissingValue(String),

    /// Type error
    #[error("Type error: {0}")]
    TypeError(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Collaborator failure while fetching observations
    #[error("Data source error: {0}")]
    DataSource(#[from] DataSourceError),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
