//! Error types for MoCab Core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid time format: '{0}', expected YYYY-MM-DDThh:mm:ss or YYYY-MM-DD")]
    InvalidTimeFormat(String),

    #[error("Invalid comparator: '{0}', expected one of eq, ne, gt, ge, lt, le")]
    InvalidComparator(String),

    #[error("Invalid condition '{condition}': {message}")]
    InvalidCondition { condition: String, message: String },

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
