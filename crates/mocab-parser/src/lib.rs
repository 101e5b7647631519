//! MoCab Parser - CSV configuration tables to AST
//!
//! This crate provides parsers for converting the MoCab configuration tables
//! (feature catalog, transformation table, training sets) into the AST
//! structures defined in `mocab-core`, plus the formula expression compiler.

pub mod csv_table;
pub mod error;
pub mod expression_parser;
pub mod feature_table;
pub mod training_set_table;
pub mod transformation_table;

// Re-export main parser types
pub use error::{ParseError, Result};
pub use expression_parser::ExpressionParser;
pub use feature_table::FeatureTableParser;
pub use training_set_table::TrainingSetTableParser;
pub use transformation_table::TransformationTableParser;
