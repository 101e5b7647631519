//! Parser error types

use mocab_core::CoreError;
use thiserror::Error;

/// Parser error
#[derive(Error, Debug)]
pub enum ParseError {
    /// CSV reading error
    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    /// Table file could not be read
    #[error("Failed to read table '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Grammar error raised by the core condition or time parsers
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Missing required column
    #[error("Missing required column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    /// Invalid field value
    #[error("Invalid value for field '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Invalid expression syntax
    #[error("Invalid expression syntax: {0}")]
    InvalidExpression(String),

    /// Invalid operator
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    /// Feature name reserved by the grammar
    #[error("Feature name '{0}' is reserved, choose another feature name")]
    ReservedName(String),

    /// More than one `[default]` category row for a feature
    #[error("Duplicate [default] category row for feature '{feature}'")]
    DuplicateDefault { feature: String },

    /// Category row declared after the `[default]` row of its feature
    #[error("[default] must be the last category row of feature '{feature}'")]
    MisplacedDefault { feature: String },

    /// Two training set rows for the same model
    #[error("Duplicate training set for model '{0}'")]
    DuplicateModel(String),

    /// Null value strategy errors
    #[error("Invalid drop clause '{0}', expected (drop)[comparator|]N")]
    InvalidDropClause(String),

    #[error("Drop clause '{0}' would drop rows without any missing value")]
    DropsCompleteRows(String),

    #[error("Unknown fill method '{0}'")]
    UnknownFillMethod(String),

    #[error("Duplicate fill strategy for column '{0}'")]
    DuplicateColumn(String),

    #[error("Duplicate default fill strategy in '{0}'")]
    DuplicateDefaultFill(String),

    #[error("Missing default fill strategy in '{0}'")]
    MissingDefaultFill(String),

    /// Error located on a table row
    #[error("{table} line {line} (model '{model}', feature '{feature}'): {source}")]
    Row {
        table: &'static str,
        line: u64,
        model: String,
        feature: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Attach table row context to an error
    pub fn at_row(self, table: &'static str, line: u64, model: &str, feature: &str) -> Self {
        ParseError::Row {
            table,
            line,
            model: model.to_string(),
            feature: feature.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, without row context
    pub fn root(&self) -> &ParseError {
        match self {
            ParseError::Row { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for parser operations
pub type Result<T> = std::result::Result<T, ParseError>;
