//! Integration tests for the inference facade

mod common;

use common::{at, bundled_config, engine_with, qcsi_patient, qcsi_population};
use mocab_sdk::{InMemoryDataSource, MocabEngineBuilder, SdkError, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

fn numbers(values: &[f64]) -> Vec<Value> {
    values.iter().map(|v| Value::Number(*v)).collect()
}

// ============================================================================
// Feature Vectors
// ============================================================================

#[test]
fn test_resolve_feature_vector() {
    let engine = engine_with(Arc::new(InMemoryDataSource::new()));
    let vector = engine
        .resolve_feature_vector(&qcsi_patient(), "qcsi", at("2022-01-19T12:00"))
        .unwrap();
    assert_eq!(vector, numbers(&[1.0, 2.0, 4.0]));
}

#[test]
fn test_resolve_values() {
    let engine = engine_with(Arc::new(InMemoryDataSource::new()));
    let values = HashMap::from([
        ("respiratory_rate".to_string(), Value::Number(29.0)),
        ("spo2".to_string(), Value::Number(87.0)),
    ]);

    let vector = engine.resolve_values(&values, "qcsi").unwrap();
    // o2 flow rate is absent, so only its default branch matches
    assert_eq!(vector, numbers(&[2.0, 5.0, 4.0]));
}

#[test]
fn test_columns_and_models() {
    let engine = engine_with(Arc::new(InMemoryDataSource::new()));
    assert_eq!(engine.model_names(), vec!["diabetes", "nsti", "qcsi"]);
    assert_eq!(
        engine.columns("qcsi").unwrap(),
        vec!["respiratory_rate", "spo2", "o2_flow_rate"]
    );
}

#[test]
fn test_unknown_model_is_not_missing_data() {
    let engine = engine_with(Arc::new(InMemoryDataSource::new()));
    let err = engine
        .resolve_feature_vector(&[], "apache", at("2022-01-19"))
        .unwrap_err();
    assert!(matches!(err, SdkError::ModelNotFound(ref name) if name == "apache"));

    let err = engine.resolve_values(&HashMap::new(), "apache").unwrap_err();
    assert!(matches!(err, SdkError::ModelNotFound(_)));
}

#[test]
fn test_inline_tables() {
    let engine = MocabEngineBuilder::new()
        .with_features_content(
            "model,feature,type_of_data,code,data_alive_time\nsofa,platelets,value,777-3,0000-00-01\n",
        )
        .with_transformation_content(
            "model,feature,type,formulate,index\nsofa,platelets,category,4=lt|20,1\nsofa,platelets,category,0=[default],1\n",
        )
        .with_training_sets_content("models,filter,duration,null_value_strategy\n")
        .build()
        .unwrap();

    let values = HashMap::from([("platelets".to_string(), Value::Number(15.0))]);
    assert_eq!(engine.resolve_values(&values, "sofa").unwrap(), numbers(&[4.0]));
    assert!(matches!(engine.training_set("sofa"), Err(SdkError::NoTrainingSet(_))));
}

#[test]
fn test_missing_table_file() {
    let config = bundled_config().with_features_table("/nonexistent/features.csv");
    let result = MocabEngineBuilder::from_config(config).build();
    assert!(matches!(result, Err(SdkError::ParseError(_))));
}

// ============================================================================
// Prediction
// ============================================================================

#[tokio::test]
async fn test_predict_for_patient() {
    let source = InMemoryDataSource::new();
    source.insert("pat-1", qcsi_patient());
    let engine = engine_with(Arc::new(source));

    let prediction = engine
        .predict_for_patient("pat-1", "qcsi", at("2022-01-19T12:00"))
        .await
        .unwrap();
    assert_eq!(prediction.features, numbers(&[1.0, 2.0, 4.0]));
    assert_eq!(prediction.score, 7.0);
}

#[tokio::test]
async fn test_predict_without_handler() {
    let engine = engine_with(Arc::new(InMemoryDataSource::new()));
    let err = engine
        .predict_for_patient("pat-1", "diabetes", at("2022-12-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::ModelNotFound(ref name) if name == "diabetes"));
}

#[tokio::test]
async fn test_predict_with_missing_slot_is_model_error() {
    // nothing recorded for the patient: respiratory rate stays null
    let engine = engine_with(Arc::new(InMemoryDataSource::new()));
    let err = engine
        .predict_for_patient("pat-2", "qcsi", at("2022-01-19T12:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Model(_)));
}

#[tokio::test]
async fn test_predict_with_unavailable_source() {
    let source = Arc::new(InMemoryDataSource::new());
    source.set_unavailable(true);
    let engine = engine_with(source);

    let err = engine
        .predict_for_patient("pat-1", "qcsi", at("2022-01-19T12:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::DataSource(_)));
}

#[tokio::test]
async fn test_predict_without_data_source() {
    let engine = MocabEngineBuilder::from_config(bundled_config())
        .with_model("qcsi", Arc::new(mocab_sdk::ScoreSumModel::new("qcsi")))
        .build()
        .unwrap();
    let err = engine
        .predict_for_patient("pat-1", "qcsi", at("2022-01-19T12:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::NoDataSource));
}

// ============================================================================
// Training Matrix
// ============================================================================

#[tokio::test]
async fn test_build_training_matrix() {
    let source = qcsi_population();
    let export = mocab_sdk::ClinicalDataSource::export_population(&source)
        .await
        .unwrap();
    let engine = engine_with(Arc::new(InMemoryDataSource::new()));

    let (matrix, dropped) = engine
        .build_training_matrix(&export.patients, "qcsi", at("2022-01-20T00:00"))
        .unwrap();
    assert_eq!(matrix.patient_ids, vec!["p1", "p2", "p3"]);
    assert_eq!(matrix.x[2], numbers(&[0.0, 2.0, 4.0]));
    assert_eq!(dropped, 0);

    let err = engine
        .build_training_matrix(&BTreeMap::new(), "nsti", at("2022-01-20T00:00"))
        .unwrap_err();
    assert!(matches!(err, SdkError::NoTrainingSet(_)));
}
