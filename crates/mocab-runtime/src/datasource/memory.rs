//! In-memory clinical data source

use super::{ClinicalDataSource, DataSourceError, PopulationExport};
use crate::dataset::Observation;
use chrono::NaiveDateTime;
use mocab_core::ast::FeatureDefinition;
use mocab_core::parse_timestamp;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use tracing::debug;

/// Data source backed by a map of patient observations.
///
/// Used by tests and demos; failure injection covers the export retry path.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    patients: RwLock<BTreeMap<String, Vec<Observation>>>,
    export_timeouts: AtomicUsize,
    unavailable: AtomicBool,
    export_calls: AtomicUsize,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a `{ "patient": [observation, ...] }` JSON document
    pub fn from_json(json: &str) -> Result<Self, DataSourceError> {
        let patients: BTreeMap<String, Vec<Observation>> =
            serde_json::from_str(json).map_err(|e| DataSourceError::Malformed(e.to_string()))?;
        Ok(Self {
            patients: RwLock::new(patients),
            ..Self::default()
        })
    }

    /// Append observations to a patient's record
    pub fn insert(&self, patient_id: impl Into<String>, observations: Vec<Observation>) {
        if let Ok(mut patients) = self.patients.write() {
            patients
                .entry(patient_id.into())
                .or_default()
                .extend(observations);
        }
    }

    /// Fail the next `count` exports with a timeout
    pub fn with_export_timeouts(self, count: usize) -> Self {
        self.export_timeouts.store(count, Ordering::SeqCst);
        self
    }

    /// Fail every request until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of export attempts so far, failed ones included
    pub fn export_calls(&self) -> usize {
        self.export_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), DataSourceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DataSourceError::Unavailable("in-memory source switched off".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, Vec<Observation>>>, DataSourceError> {
        self.patients
            .read()
            .map_err(|_| DataSourceError::Unavailable("patient store poisoned".to_string()))
    }
}

fn is_recent(observation: &Observation, since: Option<NaiveDateTime>) -> bool {
    match (since, observation.date.as_deref().and_then(parse_timestamp)) {
        (Some(bound), Some(date)) => date >= bound,
        _ => true,
    }
}

#[async_trait::async_trait]
impl ClinicalDataSource for InMemoryDataSource {
    async fn search(
        &self,
        patient_id: &str,
        feature: &FeatureDefinition,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<Observation>, DataSourceError> {
        self.check_available()?;
        let patients = self.read()?;

        let Some(record) = patients.get(patient_id) else {
            debug!("No record for patient '{}'", patient_id);
            return Ok(Vec::new());
        };

        Ok(record
            .iter()
            .filter(|obs| {
                obs.code
                    .as_deref()
                    .map(|code| feature.matches_code(code, obs.system.as_deref()))
                    .unwrap_or(false)
            })
            .filter(|obs| is_recent(obs, since))
            .cloned()
            .collect())
    }

    async fn export_population(&self) -> Result<PopulationExport, DataSourceError> {
        let attempt = self.export_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.check_available()?;

        let pending = self.export_timeouts.load(Ordering::SeqCst);
        if pending > 0 {
            self.export_timeouts.store(pending - 1, Ordering::SeqCst);
            return Err(DataSourceError::Timeout(format!("export attempt {} timed out", attempt)));
        }

        Ok(PopulationExport {
            patients: self.read()?.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocab_core::ast::{CodeRef, DataKind};
    use mocab_core::TimeWindow;

    fn glucose() -> FeatureDefinition {
        FeatureDefinition::new("glucose", DataKind::Value, TimeWindow::years(1))
            .with_code(CodeRef::with_system("2339-0", "http://loinc.org"))
    }

    fn source() -> InMemoryDataSource {
        let source = InMemoryDataSource::new();
        source.insert(
            "p1",
            vec![
                Observation::new(Some("2020-01-10"), 153.0)
                    .with_code("2339-0")
                    .with_system("http://loinc.org"),
                Observation::new(Some("2015-01-10"), 90.0).with_code("2339-0"),
                Observation::new(Some("2020-01-10"), 70.0).with_code("8462-4"),
            ],
        );
        source
    }

    #[tokio::test]
    async fn test_search_filters_code_and_date() {
        let source = source();
        let since = parse_timestamp("2019-01-01");

        let found = source.search("p1", &glucose(), since).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, mocab_core::Value::Number(153.0));

        let all = source.search("p1", &glucose(), None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_patient_is_empty() {
        let found = source().search("nobody", &glucose(), None).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_export_timeouts_then_success() {
        let source = source().with_export_timeouts(2);

        assert!(matches!(source.export_population().await, Err(DataSourceError::Timeout(_))));
        assert!(matches!(source.export_population().await, Err(DataSourceError::Timeout(_))));
        let export = source.export_population().await.unwrap();
        assert_eq!(export.len(), 1);
        assert_eq!(source.export_calls(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_source() {
        let source = source();
        source.set_unavailable(true);
        let err = source.search("p1", &glucose(), None).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_from_json() {
        let source = InMemoryDataSource::from_json(
            r#"{"p7": [{"code": "2339-0", "date": "2021-03-04", "value": 120}]}"#,
        )
        .unwrap();
        assert_eq!(source.read().unwrap()["p7"][0].value, mocab_core::Value::Number(120.0));

        assert!(matches!(
            InMemoryDataSource::from_json("[1, 2"),
            Err(DataSourceError::Malformed(_))
        ));
    }
}
