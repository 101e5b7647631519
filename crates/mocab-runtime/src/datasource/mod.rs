//! Clinical data source seam
//!
//! The runtime never talks to a record store directly. Inference asks for the
//! observations of one patient and one feature; training asks for a
//! population export holding every observation of every patient.

pub mod memory;

pub use memory::InMemoryDataSource;

use crate::dataset::Observation;
use chrono::NaiveDateTime;
use mocab_core::ast::FeatureDefinition;
use std::collections::BTreeMap;
use thiserror::Error;

/// Data source failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    /// The request did not complete in time; may be retried
    #[error("Data source timeout: {0}")]
    Timeout(String),

    /// The source refused or failed the request
    #[error("Data source unavailable: {0}")]
    Unavailable(String),

    /// The source returned data that cannot be read
    #[error("Malformed data source payload: {0}")]
    Malformed(String),
}

impl DataSourceError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, DataSourceError::Timeout(_))
    }
}

/// Observations of every patient, keyed by patient id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationExport {
    pub patients: BTreeMap<String, Vec<Observation>>,
}

impl PopulationExport {
    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }
}

/// Clinical record store consulted by the runtime
#[async_trait::async_trait]
pub trait ClinicalDataSource: Send + Sync {
    /// Observations of `patient_id` coded for `feature`, no older than `since`
    async fn search(
        &self,
        patient_id: &str,
        feature: &FeatureDefinition,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<Observation>, DataSourceError>;

    /// Every observation of every patient
    async fn export_population(&self) -> Result<PopulationExport, DataSourceError>;
}
