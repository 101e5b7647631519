//! Configuration types for MocabEngine

use crate::error::{Result, SdkError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Feature catalog table
    pub features_table: PathBuf,

    /// Transformation table
    pub transformation_table: PathBuf,

    /// Training set table; inference-only deployments leave it unset
    pub training_sets_table: Option<PathBuf>,

    /// How long a training trigger waits for the model's lock
    pub lock_wait_ms: u64,

    /// Population export retry policy
    pub export: ExportConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            features_table: PathBuf::from("config/features.csv"),
            transformation_table: PathBuf::from("config/transformation.csv"),
            training_sets_table: Some(PathBuf::from("config/training_sets.csv")),
            lock_wait_ms: 500,
            export: ExportConfig::default(),
        }
    }
}

/// Export retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 2_000,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `config/mocab.*` and `MOCAB_*` variables
    pub fn load() -> Result<Self> {
        Self::load_from("config/mocab")
    }

    /// Load configuration from the given file (extension optional) and the
    /// environment. A missing file leaves the defaults in place.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let name = path.as_ref().to_string_lossy().into_owned();
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&name).required(false))
            .add_source(
                config::Environment::with_prefix("MOCAB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| SdkError::ConfigError(e.to_string()))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| SdkError::ConfigError(format!("Failed to deserialize config: {}", e)))?;

        tracing::info!(
            "Engine configuration: features={}, transformation={}",
            config.features_table.display(),
            config.transformation_table.display()
        );
        Ok(config)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn with_features_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.features_table = path.into();
        self
    }

    pub fn with_transformation_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.transformation_table = path.into();
        self
    }

    pub fn with_training_sets_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.training_sets_table = Some(path.into());
        self
    }

    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait_ms = wait.as_millis() as u64;
        self
    }

    pub fn with_export(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.export = ExportConfig {
            max_attempts,
            delay_ms: delay.as_millis() as u64,
        };
        self
    }
}
