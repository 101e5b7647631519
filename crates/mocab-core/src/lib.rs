//! MoCab Core - Core types and definitions for the MoCab feature pipeline
//!
//! This crate provides the fundamental types used across the MoCab workspace:
//! - Value types for raw and resolved clinical data
//! - Time windows and timestamp parsing
//! - AST definitions for feature catalogs, transformation rows and training sets
//! - Shared condition grammar (category conditions and data filters)
//! - Error types

pub mod ast;
pub mod condition;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::CoreError;
pub use types::{parse_timestamp, TimeWindow, Value};
