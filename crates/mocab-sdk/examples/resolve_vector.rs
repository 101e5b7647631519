//! Feature vector resolution
//!
//! Loads the bundled tables, reads a few patients from a JSON record dump and
//! prints each patient's qCSI vector and score.
//!
//! To run this example:
//! ```bash
//! RUST_LOG=mocab_runtime=debug cargo run --package mocab-sdk --example resolve_vector
//! ```

use anyhow::Context;
use mocab_sdk::{
    parse_timestamp, EngineConfig, InMemoryDataSource, MocabEngineBuilder, ScoreSumModel,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const PATIENTS: &str = include_str!("../../../config/demo_patients.json");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mocab_sdk=info,mocab_runtime=info".into()),
        )
        .init();

    let root = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config");
    let config = EngineConfig::default()
        .with_features_table(format!("{}/features.csv", root))
        .with_transformation_table(format!("{}/transformation.csv", root))
        .with_training_sets_table(format!("{}/training_sets.csv", root));

    let source = InMemoryDataSource::from_json(PATIENTS).context("demo patients")?;
    let engine = MocabEngineBuilder::from_config(config)
        .with_data_source(Arc::new(source))
        .with_model("qcsi", Arc::new(ScoreSumModel::new("qcsi")))
        .build()?;

    let reference = parse_timestamp("2022-01-19T23:00").context("reference time")?;
    println!("Columns: {:?}\n", engine.columns("qcsi")?);

    for patient in ["qcsi-001", "qcsi-002", "qcsi-003", "qcsi-004"] {
        match engine.predict_for_patient(patient, "qcsi", reference).await {
            Ok(prediction) => {
                let vector: Vec<String> =
                    prediction.features.iter().map(ToString::to_string).collect();
                println!("{}: [{}] score {}", patient, vector.join(", "), prediction.score);
            }
            Err(err) => println!("{}: not scored ({})", patient, err),
        }
    }

    Ok(())
}
