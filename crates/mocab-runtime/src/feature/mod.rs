//! Per-feature resolution
//!
//! Runs the extract, filter and aggregate stages for every feature of a model
//! and produces one resolved value per feature.

pub mod resolver;

pub use resolver::{FeatureResolver, ResolvedFeature, ResolvedFeatures};
