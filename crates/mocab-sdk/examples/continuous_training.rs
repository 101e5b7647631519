//! Continuous training
//!
//! Triggers periodic qCSI training runs against a data source whose bulk
//! export times out a couple of times before answering. Shows the retry
//! policy, the per-model lock and cancellation.
//!
//! To run this example:
//! ```bash
//! cargo run --package mocab-sdk --example continuous_training
//! MOCAB_EXPORT__DELAY_MS=200 cargo run --package mocab-sdk --example continuous_training
//! ```

use anyhow::Context;
use mocab_sdk::{
    parse_timestamp, EngineConfig, InMemoryDataSource, MocabEngineBuilder, ScoreSumModel,
    SdkError, TrainingCoordinator,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const PATIENTS: &str = include_str!("../../../config/demo_patients.json");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "mocab_sdk=info".into()),
        )
        .init();

    let root = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config");
    let config = EngineConfig::load()?
        .with_features_table(format!("{}/features.csv", root))
        .with_transformation_table(format!("{}/transformation.csv", root))
        .with_training_sets_table(format!("{}/training_sets.csv", root));

    let source = InMemoryDataSource::from_json(PATIENTS)
        .context("demo patients")?
        .with_export_timeouts(2);
    let engine = MocabEngineBuilder::from_config(config)
        .with_data_source(Arc::new(source))
        .with_model("qcsi", Arc::new(ScoreSumModel::new("qcsi")))
        .build()?;

    let coordinator = TrainingCoordinator::new(Arc::new(engine));
    let reference = parse_timestamp("2022-01-20T00:00").context("reference time")?;

    for round in 1..=2 {
        let ticket = coordinator.trigger("qcsi", reference).await?;
        info!("Round {}: run {} acknowledged", round, ticket.run_id);

        // a second trigger while the run holds the lock is turned away
        match coordinator.trigger("qcsi", reference).await {
            Err(SdkError::TrainingBusy(model)) => info!("'{}' is busy, trigger skipped", model),
            Ok(extra) => extra.cancel(),
            Err(err) => return Err(err.into()),
        }

        let outcome = ticket.wait().await?;
        println!(
            "Round {}: {} rows, {} dropped, parameters {:?}",
            round, outcome.rows, outcome.dropped, outcome.artifact.parameters
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let ticket = coordinator.trigger("qcsi", reference).await?;
    ticket.cancel();
    match ticket.wait().await {
        Err(SdkError::Cancelled(model)) => println!("Run for '{}' cancelled", model),
        other => println!("Unexpected end of cancelled run: {:?}", other.map(|o| o.rows)),
    }

    Ok(())
}
