//! Common test utilities for SDK integration tests

#![allow(dead_code)]

use chrono::NaiveDateTime;
use mocab_sdk::{
    parse_timestamp, EngineConfig, InMemoryDataSource, MocabEngine, MocabEngineBuilder,
    Observation, ScoreSumModel, Value,
};
use std::sync::Arc;

/// Engine configuration pointing at the bundled tables
pub fn bundled_config() -> EngineConfig {
    let root = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config");
    EngineConfig::default()
        .with_features_table(format!("{}/features.csv", root))
        .with_transformation_table(format!("{}/transformation.csv", root))
        .with_training_sets_table(format!("{}/training_sets.csv", root))
}

/// Engine over the bundled tables with score handlers for qcsi and nsti
pub fn engine_with(source: Arc<InMemoryDataSource>) -> MocabEngine {
    MocabEngineBuilder::from_config(bundled_config())
        .with_data_source(source)
        .with_model("qcsi", Arc::new(ScoreSumModel::new("qcsi")))
        .with_model("nsti", Arc::new(ScoreSumModel::new("nsti")))
        .build()
        .expect("bundled tables load")
}

pub fn at(s: &str) -> NaiveDateTime {
    parse_timestamp(s).expect("valid timestamp")
}

pub fn loinc(code: &str, date: &str, value: f64) -> Observation {
    Observation::new(Some(date), Value::Number(value))
        .with_code(code)
        .with_system("http://loinc.org")
}

pub fn icu_transfer(date: &str) -> Observation {
    Observation::new(Some(date), true)
        .with_code("305351004")
        .with_system("http://snomed.info/sct")
}

/// qcsi reference patient: respiratory rate 25, SpO2 90, O2 flow 3
pub fn qcsi_patient() -> Vec<Observation> {
    vec![
        loinc("9279-1", "2022-01-19T11:53", 25.0),
        loinc("3151-8", "2022-01-19T11:53", 3.0),
        loinc("59408-5", "2022-01-19T11:53", 90.0),
    ]
}

/// Three qcsi patients: two transferred to intensive care
pub fn qcsi_population() -> InMemoryDataSource {
    let source = InMemoryDataSource::new();
    source.insert(
        "p1",
        vec![
            loinc("9279-1", "2022-01-19T10:00", 30.0),
            loinc("2708-6", "2022-01-19T10:00", 85.0),
            loinc("3151-8", "2022-01-19T10:00", 6.0),
            icu_transfer("2022-01-19T18:00"),
        ],
    );
    source.insert(
        "p2",
        vec![
            loinc("9279-1", "2022-01-19T10:00", 20.0),
            loinc("59408-5", "2022-01-19T10:00", 95.0),
            loinc("3151-8", "2022-01-19T10:00", 1.0),
        ],
    );
    source.insert(
        "p3",
        vec![
            loinc("59408-5", "2022-01-19T10:00", 91.0),
            icu_transfer("2022-01-19T18:00"),
        ],
    );
    source
}
