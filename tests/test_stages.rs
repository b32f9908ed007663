//! Integration tests: individual pipeline stages

use chrono::NaiveDate;
use ndarray::Array2;
use netsec_pipeline::artifact::{IngestionArtifact, ValidationArtifact};
use netsec_pipeline::config::{PipelineConfig, PipelineSettings};
use netsec_pipeline::imputation::{Imputer, KNNImputer};
use netsec_pipeline::pipeline::PipelineStage;
use netsec_pipeline::schema::Schema;
use netsec_pipeline::stages::{DataIngestion, DataTransformation, DataValidation};
use netsec_pipeline::store::{Document, MemoryStore};
use netsec_pipeline::training::select_best;
use netsec_pipeline::utils::data_loader::{DataLoader, DataSaver};
use netsec_pipeline::utils::persist::{load_array, load_object, save_object, write_yaml_file, KIND_IMPUTER};
use polars::prelude::*;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

fn config_in(dir: &Path) -> PipelineConfig {
    let settings = PipelineSettings::default()
        .with_artifact_root(dir.join("Artifacts"))
        .with_final_model_dir(dir.join("final_model"))
        .with_schema_file(dir.join("schema.yaml"));
    let stamp = NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(3, 4, 5))
        .unwrap();
    PipelineConfig::new(settings, stamp)
}

fn documents(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| {
            let value = json!({
                "_id": format!("id{}", i),
                "a": (i % 2) as i64,
                "b": if i % 5 == 0 { json!("na") } else { json!(i as f64 * 0.5) },
                "Result": if i % 2 == 0 { -1 } else { 1 },
            });
            match value {
                serde_json::Value::Object(map) => map,
                _ => unreachable!(),
            }
        })
        .collect()
}

fn store_with(n: usize) -> MemoryStore {
    let mut store = MemoryStore::new();
    store.insert_many("KRISHAI", "NetworkData", documents(n));
    store
}

fn read(path: &Path) -> DataFrame {
    DataLoader::new().load_csv(path).unwrap()
}

#[test]
fn test_ingestion_writes_three_files() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let store = store_with(20);

    let artifact = DataIngestion::new(&config.ingestion, &store).run().unwrap();

    let feature_store = read(&config.ingestion.feature_store_file_path);
    assert_eq!(feature_store.height(), 20);
    assert!(feature_store.column("_id").is_err());
    assert_eq!(feature_store.column("b").unwrap().null_count(), 4);

    let train = read(&artifact.trained_file_path);
    let test = read(&artifact.test_file_path);
    assert_eq!(train.height(), 16);
    assert_eq!(test.height(), 4);
}

#[test]
fn test_split_is_deterministic() {
    let store = store_with(30);
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let config_a = config_in(first.path());
    let config_b = config_in(second.path());

    let a = DataIngestion::new(&config_a.ingestion, &store).run().unwrap();
    let b = DataIngestion::new(&config_b.ingestion, &store).run().unwrap();

    assert!(read(&a.trained_file_path).equals_missing(&read(&b.trained_file_path)));
    assert!(read(&a.test_file_path).equals_missing(&read(&b.test_file_path)));
}

#[test]
fn test_empty_collection_fails_in_ingestion() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let store = MemoryStore::new();

    let err = DataIngestion::new(&config.ingestion, &store).run().unwrap_err();
    assert_eq!(err.stage, PipelineStage::Ingestion);
}

fn write_splits(dir: &Path, train: &mut DataFrame, test: &mut DataFrame) -> IngestionArtifact {
    let artifact = IngestionArtifact {
        trained_file_path: dir.join("in").join("train.csv"),
        test_file_path: dir.join("in").join("test.csv"),
    };
    DataSaver::save_csv(train, &artifact.trained_file_path).unwrap();
    DataSaver::save_csv(test, &artifact.test_file_path).unwrap();
    artifact
}

fn ramp(name: &str, n: usize, offset: f64) -> Series {
    let values: Vec<f64> = (0..n).map(|i| i as f64 + offset).collect();
    Series::new(name.into(), values)
}

/// Ten columns; the first `shifted` of them move far away in `current`.
fn drift_frames(shifted: usize) -> (DataFrame, DataFrame) {
    let names: Vec<String> = (0..10).map(|j| format!("c{}", j)).collect();
    let base = DataFrame::new(names.iter().map(|n| ramp(n, 30, 0.0)).collect()).unwrap();
    let current = DataFrame::new(
        names
            .iter()
            .enumerate()
            .map(|(j, n)| ramp(n, 30, if j < shifted { 1000.0 } else { 0.0 }))
            .collect(),
    )
    .unwrap();
    (base, current)
}

#[test]
fn test_drift_fraction_boundary() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let names: Vec<String> = (0..10).map(|j| format!("c{}", j)).collect();
    let validation = DataValidation::with_schema(
        &config.validation,
        Schema::from_pairs(names.iter().map(|n| (n.clone(), "float64"))),
    );

    let (base, current) = drift_frames(1);
    assert!(validation.detect_drift(&base, &current).unwrap());

    let (base, current) = drift_frames(2);
    assert!(!validation.detect_drift(&base, &current).unwrap());

    let report = std::fs::read_to_string(&config.validation.drift_report_file_path).unwrap();
    let parsed: serde_yaml::Value = serde_yaml::from_str(&report).unwrap();
    assert_eq!(parsed["c0"]["drift_status"], serde_yaml::Value::Bool(true));
    assert_eq!(parsed["c1"]["drift_status"], serde_yaml::Value::Bool(true));
    assert_eq!(parsed["c2"]["drift_status"], serde_yaml::Value::Bool(false));
}

#[test]
fn test_schema_gates() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    let five = DataValidation::with_schema(
        &config.validation,
        Schema::from_pairs(["a", "b", "c", "d", "e"].into_iter().map(|n| (n, "int64"))),
    );
    let four = df!("a" => &[1], "b" => &[1], "c" => &[1], "d" => &[1]).unwrap();
    assert!(!five.validate_column_count(&four));

    let abc = DataValidation::with_schema(
        &config.validation,
        Schema::from_pairs(["a", "b", "c"].into_iter().map(|n| (n, "int64"))),
    );
    let abd = df!("a" => &[1], "b" => &[1], "d" => &[1]).unwrap();
    let abc_extra = df!("a" => &[1], "b" => &[1], "c" => &[1], "extra" => &[1]).unwrap();
    assert!(!abc.validate_column_names(&abd));
    assert!(abc.validate_column_names(&abc_extra));
}

#[test]
fn test_routing_without_drift() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let (mut train, mut test) = drift_frames(0);
    let ingestion = write_splits(dir.path(), &mut train, &mut test);

    let names: Vec<String> = (0..10).map(|j| format!("c{}", j)).collect();
    let schema = Schema::from_pairs(names.iter().map(|n| (n.clone(), "float64")));
    write_yaml_file(&config.validation.schema_file_path, &schema).unwrap();

    let artifact = DataValidation::new(&config.validation).unwrap().run(&ingestion).unwrap();

    assert!(artifact.validation_status);
    assert!(read(&artifact.valid_train_file_path).equals_missing(&train));
    assert!(read(&artifact.valid_test_file_path).equals_missing(&test));
    assert!(!artifact.invalid_train_file_path.exists());
    assert!(artifact.drift_report_file_path.exists());
}

#[test]
fn test_routing_with_drift() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let (mut train, mut test) = drift_frames(3);
    let ingestion = write_splits(dir.path(), &mut train, &mut test);

    let names: Vec<String> = (0..10).map(|j| format!("c{}", j)).collect();
    let validation = DataValidation::with_schema(
        &config.validation,
        Schema::from_pairs(names.iter().map(|n| (n.clone(), "float64"))),
    );
    let artifact = validation.run(&ingestion).unwrap();

    assert!(!artifact.validation_status);
    assert!(read(&artifact.invalid_train_file_path).equals_missing(&train));
    assert!(read(&artifact.invalid_test_file_path).equals_missing(&test));
    assert!(!artifact.valid_train_file_path.exists());
    assert!(artifact.drift_report_file_path.exists());

    let text = std::fs::read_to_string(&artifact.drift_report_file_path).unwrap();
    let report: serde_yaml::Mapping = serde_yaml::from_str(&text).unwrap();
    assert_eq!(report.len(), 10);

    // Transformation still reads the valid paths, which were never written
    let err = DataTransformation::new(&config.transformation).run(&artifact).unwrap_err();
    assert_eq!(err.stage, PipelineStage::Transformation);
}

#[test]
fn test_schema_mismatch_keeps_data_valid_but_fails_status() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let (mut train, mut test) = drift_frames(0);
    let ingestion = write_splits(dir.path(), &mut train, &mut test);

    let validation = DataValidation::with_schema(
        &config.validation,
        Schema::from_pairs([("c0", "float64"), ("missing", "float64")]),
    );
    let artifact = validation.run(&ingestion).unwrap();

    assert!(!artifact.validation_status);
    assert!(artifact.valid_train_file_path.exists());
    assert!(artifact.valid_test_file_path.exists());
}

#[test]
fn test_missing_schema_file_fails_validation() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let err = DataValidation::new(&config.validation).err().unwrap();
    assert_eq!(err.stage, PipelineStage::Validation);
}

fn validated_splits(dir: &Path, config: &PipelineConfig) -> ValidationArtifact {
    let mut train = df!(
        "x1" => &[Some(1.0), Some(2.0), None, Some(4.0), Some(5.0), Some(6.0)],
        "x2" => &[Some(0.5), None, Some(1.5), Some(2.0), Some(2.5), Some(3.0)],
        "Result" => &[-1i64, -1, -1, 1, 1, 1]
    )
    .unwrap();
    let mut test = df!(
        "x1" => &[Some(1.5), None],
        "x2" => &[Some(0.7), Some(2.8)],
        "Result" => &[-1i64, 1]
    )
    .unwrap();

    DataSaver::save_csv(&mut train, &config.validation.valid_train_file_path).unwrap();
    DataSaver::save_csv(&mut test, &config.validation.valid_test_file_path).unwrap();

    ValidationArtifact {
        validation_status: true,
        valid_train_file_path: config.validation.valid_train_file_path.clone(),
        valid_test_file_path: config.validation.valid_test_file_path.clone(),
        invalid_train_file_path: config.validation.invalid_train_file_path.clone(),
        invalid_test_file_path: config.validation.invalid_test_file_path.clone(),
        drift_report_file_path: dir.join("unused.yaml"),
    }
}

#[test]
fn test_transformation_outputs() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let validation = validated_splits(dir.path(), &config);

    let artifact = DataTransformation::new(&config.transformation).run(&validation).unwrap();

    let train = load_array(&artifact.transformed_train_file_path).unwrap();
    let test = load_array(&artifact.transformed_test_file_path).unwrap();
    assert_eq!(train.dim(), (6, 3));
    assert_eq!(test.dim(), (2, 3));
    assert!(train.iter().chain(test.iter()).all(|v| !v.is_nan()));

    // -1 becomes 0, nothing else changes
    let labels: Vec<f64> = train.column(2).to_vec();
    assert_eq!(labels, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    assert_eq!(test.column(2).to_vec(), vec![0.0, 1.0]);

    assert!(artifact.transformed_object_file_path.exists());
    assert!(config.transformation.final_preprocessor_file_path.exists());
}

#[test]
fn test_imputer_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("preprocessing.bin");
    let x = Array2::from_shape_vec(
        (4, 2),
        vec![1.0, 2.0, f64::NAN, 3.0, 3.0, f64::NAN, 4.0, 5.0],
    )
    .unwrap();

    let mut imputer = KNNImputer::new(2);
    let before = imputer.fit_transform(&x).unwrap();
    save_object(&path, KIND_IMPUTER, &imputer).unwrap();

    let loaded: KNNImputer = load_object(&path, KIND_IMPUTER).unwrap();
    assert_eq!(loaded.transform(&x).unwrap(), before);
}

#[test]
fn test_best_model_selection() {
    let report = [("A", 0.8), ("B", 0.95), ("C", 0.6)];
    assert_eq!(select_best(&report), Some("B"));
}
