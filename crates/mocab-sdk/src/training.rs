//! Training coordinator
//!
//! A trigger acknowledges immediately with a [`TrainingTicket`]; the run
//! itself happens on a spawned task:
//! 1. export the population, retrying timeouts with a fixed delay;
//! 2. build and clean the training matrix on the blocking pool;
//! 3. fit the model handler and publish the artifact.
//!
//! At most one run per model holds the model's lock. The cancellation token
//! is checked between stages and between patients.

use crate::engine::MocabEngine;
use crate::error::{Result, SdkError};
use crate::model::{ModelRuntime, TrainedArtifact};
use chrono::NaiveDateTime;
use mocab_runtime::{
    ClinicalDataSource, DataSourceError, PopulationExport, TrainingMatrix, TrainingReport,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Cooperative cancellation flag shared between a ticket and its run
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Bulk export retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl ExportPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Export the population; only timeouts are retried
    pub async fn export(
        &self,
        source: &dyn ClinicalDataSource,
        token: &CancellationToken,
        model: &str,
    ) -> Result<PopulationExport> {
        let mut last = String::new();

        for attempt in 1..=self.max_attempts {
            if token.is_cancelled() {
                return Err(SdkError::Cancelled(model.to_string()));
            }

            match source.export_population().await {
                Ok(export) => {
                    info!("Exported {} patients on attempt {}", export.len(), attempt);
                    return Ok(export);
                }
                Err(err @ DataSourceError::Timeout(_)) => {
                    warn!("Export attempt {}/{} timed out: {}", attempt, self.max_attempts, err);
                    last = err.to_string();
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SdkError::ExportExhausted {
            attempts: self.max_attempts,
            last,
        })
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub run_id: Uuid,
    pub model: String,
    pub rows: usize,
    /// Patients left out of the matrix
    pub dropped: usize,
    pub artifact: TrainedArtifact,
}

/// Acknowledgement of a triggered run
#[derive(Debug)]
pub struct TrainingTicket {
    pub run_id: Uuid,
    pub model: String,
    token: CancellationToken,
    handle: JoinHandle<Result<TrainingOutcome>>,
}

impl TrainingTicket {
    /// Ask the run to stop at its next checkpoint
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to end
    pub async fn wait(self) -> Result<TrainingOutcome> {
        self.handle
            .await
            .map_err(|e| SdkError::TaskFailed(e.to_string()))?
    }
}

/// Schedules training runs, one at a time per model
pub struct TrainingCoordinator {
    engine: Arc<MocabEngine>,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    artifacts: Arc<RwLock<HashMap<String, TrainedArtifact>>>,
    lock_wait: Duration,
    export: ExportPolicy,
}

impl TrainingCoordinator {
    pub fn new(engine: Arc<MocabEngine>) -> Self {
        let config = engine.config();
        let lock_wait = config.lock_wait();
        let export = ExportPolicy::new(
            config.export.max_attempts,
            Duration::from_millis(config.export.delay_ms),
        );

        Self {
            engine,
            locks: StdMutex::new(HashMap::new()),
            artifacts: Arc::new(RwLock::new(HashMap::new())),
            lock_wait,
            export,
        }
    }

    pub fn with_export_policy(mut self, export: ExportPolicy) -> Self {
        self.export = export;
        self
    }

    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    /// Latest artifact published for a model
    pub fn artifact(&self, model: &str) -> Option<TrainedArtifact> {
        self.artifacts
            .read()
            .ok()
            .and_then(|artifacts| artifacts.get(model).cloned())
    }

    /// Start a training run of `model` against the reference time `reference`.
    ///
    /// Fails fast when the model cannot be trained, and with
    /// [`SdkError::TrainingBusy`] when another run keeps the model's lock
    /// past the configured wait.
    pub async fn trigger(&self, model: &str, reference: NaiveDateTime) -> Result<TrainingTicket> {
        self.engine.columns(model)?;
        self.engine.training_set(model)?;
        let handler = self
            .engine
            .models()
            .get(model)
            .ok_or_else(|| SdkError::ModelNotFound(model.to_string()))?;
        let source = self.engine.data_source()?;

        let guard = self.acquire(model).await?;

        let run_id = Uuid::new_v4();
        let token = CancellationToken::new();
        info!("Training run {} started for '{}'", run_id, model);

        let run = TrainingRun {
            run_id,
            model: model.to_string(),
            reference,
            engine: Arc::clone(&self.engine),
            source,
            handler,
            export: self.export,
            token: token.clone(),
            artifacts: Arc::clone(&self.artifacts),
        };
        let handle = tokio::spawn(run.execute(guard));

        Ok(TrainingTicket {
            run_id,
            model: model.to_string(),
            token,
            handle,
        })
    }

    async fn acquire(&self, model: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| SdkError::TaskFailed("training lock table poisoned".to_string()))?;
            Arc::clone(locks.entry(model.to_string()).or_default())
        };

        tokio::time::timeout(self.lock_wait, lock.lock_owned())
            .await
            .map_err(|_| SdkError::TrainingBusy(model.to_string()))
    }
}

struct TrainingRun {
    run_id: Uuid,
    model: String,
    reference: NaiveDateTime,
    engine: Arc<MocabEngine>,
    source: Arc<dyn ClinicalDataSource>,
    handler: Arc<dyn ModelRuntime>,
    export: ExportPolicy,
    token: CancellationToken,
    artifacts: Arc<RwLock<HashMap<String, TrainedArtifact>>>,
}

impl TrainingRun {
    async fn execute(self, _guard: OwnedMutexGuard<()>) -> Result<TrainingOutcome> {
        let result = self.stages().await;
        match &result {
            Ok(outcome) => info!(
                "Training run {} for '{}' finished: {} rows, {} dropped",
                self.run_id, self.model, outcome.rows, outcome.dropped
            ),
            Err(err) => warn!("Training run {} for '{}' failed: {}", self.run_id, self.model, err),
        }
        result
    }

    async fn stages(&self) -> Result<TrainingOutcome> {
        let export = self
            .export
            .export(self.source.as_ref(), &self.token, &self.model)
            .await?;
        self.checkpoint()?;

        let (matrix, report) = build_matrix(
            Arc::clone(&self.engine),
            export,
            self.model.clone(),
            self.reference,
            self.token.clone(),
        )
        .await?;
        self.checkpoint()?;

        let training = self.engine.training_set(&self.model)?;
        let artifact = self
            .handler
            .fit(&matrix.x_f64(), &matrix.y_f64(), &training.config)?;
        self.checkpoint()?;

        if let Ok(mut artifacts) = self.artifacts.write() {
            artifacts.insert(self.model.clone(), artifact.clone());
        }

        Ok(TrainingOutcome {
            run_id: self.run_id,
            model: self.model.clone(),
            rows: matrix.len(),
            dropped: report.dropped(),
            artifact,
        })
    }

    fn checkpoint(&self) -> Result<()> {
        if self.token.is_cancelled() {
            info!("Training run {} for '{}' cancelled", self.run_id, self.model);
            return Err(SdkError::Cancelled(self.model.clone()));
        }
        Ok(())
    }
}

/// Matrix stage of a run, on the blocking pool
async fn build_matrix(
    engine: Arc<MocabEngine>,
    export: PopulationExport,
    model: String,
    reference: NaiveDateTime,
    token: CancellationToken,
) -> Result<(TrainingMatrix, TrainingReport)> {
    tokio::task::spawn_blocking(move || {
        engine
            .training_matrix_until(&export.patients, &model, reference, || token.is_cancelled())?
            .ok_or_else(|| SdkError::Cancelled(model.clone()))
    })
    .await
    .map_err(|err| SdkError::TaskFailed(err.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MocabEngineBuilder;
    use mocab_core::{parse_timestamp, Value};
    use mocab_runtime::Observation;
    use std::collections::BTreeMap;

    fn engine() -> Arc<MocabEngine> {
        let engine = MocabEngineBuilder::new()
            .with_features_content(include_str!("../../../config/features.csv"))
            .with_transformation_content(include_str!("../../../config/transformation.csv"))
            .with_training_sets_content(include_str!("../../../config/training_sets.csv"))
            .build()
            .unwrap();
        Arc::new(engine)
    }

    fn loinc(code: &str, value: f64) -> Observation {
        Observation::new(Some("2022-01-19T10:00"), Value::Number(value))
            .with_code(code)
            .with_system("http://loinc.org")
    }

    fn population() -> PopulationExport {
        let transferred = Observation::new(Some("2022-01-19T18:00"), true)
            .with_code("305351004")
            .with_system("http://snomed.info/sct");
        let patients = BTreeMap::from([
            (
                "p1".to_string(),
                vec![
                    loinc("9279-1", 30.0),
                    loinc("2708-6", 85.0),
                    loinc("3151-8", 6.0),
                    transferred,
                ],
            ),
            (
                "p2".to_string(),
                vec![loinc("9279-1", 20.0), loinc("59408-5", 95.0), loinc("3151-8", 1.0)],
            ),
        ]);
        PopulationExport { patients }
    }

    #[tokio::test]
    async fn test_matrix_stage_runs_off_the_worker() {
        let reference = parse_timestamp("2022-01-20T00:00").unwrap();
        let (matrix, report) = build_matrix(
            engine(),
            population(),
            "qcsi".to_string(),
            reference,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(matrix.patient_ids, vec!["p1", "p2"]);
        assert_eq!(report.patients, 2);
    }

    #[tokio::test]
    async fn test_matrix_stage_observes_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let reference = parse_timestamp("2022-01-20T00:00").unwrap();

        let err = build_matrix(engine(), population(), "qcsi".to_string(), reference, token)
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::Cancelled(ref model) if model == "qcsi"));
    }
}
