//! Abstract Syntax Tree (AST) definitions for MoCab
//!
//! This module contains the definitions loaded from the configuration tables:
//! - Operators and comparators
//! - Formula expressions
//! - Feature catalog
//! - Transformation rows
//! - Training sets

pub mod expression;
pub mod feature;
pub mod operator;
pub mod training;
pub mod transformation;

pub use expression::{Expression, UnaryOperator};
pub use feature::{CodeRef, DataKind, FeatureCatalog, FeatureDefinition, ModelFeatures, SearchStrategy};
pub use operator::{Comparator, Operator};
pub use training::{
    DropRule, FillMethod, FilterKind, FilterRule, FilterThreshold, NullValueStrategy,
    TrainingConfig, TrainingSet,
};
pub use transformation::{
    ModelTransformation, SlotRole, TransformationRow, TransformationTable, VariableSpec,
    VariableType,
};
