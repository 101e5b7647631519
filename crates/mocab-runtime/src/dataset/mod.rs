//! Observation data sets
//!
//! Raw observations from the data source become a [`DataSet`] of
//! (date, value) points per feature, which the filter engine prunes and the
//! aggregation selector reduces.

pub mod aggregation;
pub mod extractor;

pub use aggregation::{Aggregator, Selection};
pub use extractor::DataSetExtractor;

use chrono::NaiveDateTime;
use mocab_core::Value;
use serde::{Deserialize, Serialize};

/// One raw observation as delivered by a clinical data source
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Source code of the observation, used to allocate it to features
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Coding system of `code`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Raw effective timestamp; may be absent or unparseable
    #[serde(default)]
    pub date: Option<String>,

    /// Raw value
    #[serde(default)]
    pub value: Value,
}

impl Observation {
    pub fn new(date: Option<&str>, value: impl Into<Value>) -> Self {
        Self {
            code: None,
            system: None,
            date: date.map(str::to_string),
            value: value.into(),
        }
    }

    /// Undated observation
    pub fn undated(value: impl Into<Value>) -> Self {
        Self::new(None, value)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// A (date, value) point of a data set
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub date: Option<NaiveDateTime>,
    pub value: Value,
}

impl DataPoint {
    pub fn new(date: Option<NaiveDateTime>, value: Value) -> Self {
        Self { date, value }
    }
}

/// Ordered (date, value) series of one feature
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    pub points: Vec<DataPoint>,
}

impl DataSet {
    pub fn new(points: Vec<DataPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataPoint> {
        self.points.iter()
    }

    pub fn dates(&self) -> Vec<Option<NaiveDateTime>> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.points.iter().map(|p| p.value.clone()).collect()
    }
}

impl FromIterator<DataPoint> for DataSet {
    fn from_iter<I: IntoIterator<Item = DataPoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}
