//! Type system for MoCab
//!
//! This module contains the runtime type system including:
//! - Value types
//! - Time windows and timestamp parsing

pub mod time;
pub mod value;

pub use time::{parse_timestamp, TimeWindow};
pub use value::Value;
