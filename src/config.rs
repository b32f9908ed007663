//! Pipeline configuration
//!
//! [`PipelineSettings`] is the user-facing, file-loadable layer. A run turns
//! it into an immutable [`PipelineConfig`] that fixes the timestamped
//! artifact directory once and derives every stage path from it.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{NetsecError, Result};
use crate::imputation::KnnImputerParams;
use crate::training::ModelMenu;
use crate::utils::persist::read_yaml_file;

/// Format of the per-run artifact directory name
pub const TIMESTAMP_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

pub const ENV_STORE_ROOT: &str = "NETSEC_STORE_ROOT";
pub const ENV_TRAINING_BUCKET: &str = "NETSEC_TRAINING_BUCKET";

/// Settings for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Parent of every timestamped artifact directory
    pub artifact_root: PathBuf,

    /// Well-known location of the latest preprocessor and model
    pub final_model_dir: PathBuf,

    /// YAML file declaring the expected columns
    pub schema_file_path: PathBuf,

    /// Label column, separated from the features before imputation
    pub target_column: String,

    pub database_name: String,
    pub collection_name: String,

    /// Root directory of the JSON document store
    pub store_root: PathBuf,

    /// Fraction of rows held out for testing
    pub train_test_split_ratio: f64,

    /// Seed of the train/test shuffle
    pub split_seed: u64,

    /// A column drifts when its KS p-value is below this
    pub drift_threshold: f64,

    /// Largest tolerated fraction of drifted columns
    pub max_drift_fraction: f64,

    pub imputer: KnnImputerParams,

    /// Folds used by every grid search
    pub cv_folds: usize,

    pub model_menu: ModelMenu,

    /// S3 bucket for artifact sync; sync is skipped when unset
    pub training_bucket: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            artifact_root: PathBuf::from("Artifacts"),
            final_model_dir: PathBuf::from("final_model"),
            schema_file_path: PathBuf::from("data_schema").join("schema.yaml"),
            target_column: "Result".to_string(),
            database_name: "KRISHAI".to_string(),
            collection_name: "NetworkData".to_string(),
            store_root: PathBuf::from("data_store"),
            train_test_split_ratio: 0.2,
            split_seed: 42,
            drift_threshold: 0.05,
            max_drift_fraction: 0.1,
            imputer: KnnImputerParams::default(),
            cv_folds: 3,
            model_menu: ModelMenu::default(),
            training_bucket: None,
        }
    }
}

impl PipelineSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from YAML; missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let settings: Self = read_yaml_file(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults or file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        Ok(settings.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply `NETSEC_STORE_ROOT` and `NETSEC_TRAINING_BUCKET` as looked up by `lookup`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_STORE_ROOT) {
            self.store_root = PathBuf::from(root);
        }
        if let Some(bucket) = lookup(ENV_TRAINING_BUCKET) {
            self.training_bucket = if bucket.is_empty() { None } else { Some(bucket) };
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.train_test_split_ratio > 0.0 && self.train_test_split_ratio < 1.0) {
            return Err(NetsecError::ConfigError(format!(
                "train_test_split_ratio must be in (0, 1), got {}",
                self.train_test_split_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.max_drift_fraction) {
            return Err(NetsecError::ConfigError(format!(
                "max_drift_fraction must be in [0, 1], got {}",
                self.max_drift_fraction
            )));
        }
        if self.cv_folds < 2 {
            return Err(NetsecError::ConfigError("cv_folds must be at least 2".to_string()));
        }
        if self.imputer.n_neighbors == 0 {
            return Err(NetsecError::ConfigError("imputer.n_neighbors must be positive".to_string()));
        }
        Ok(())
    }

    pub fn with_artifact_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_root = dir.into();
        self
    }

    pub fn with_final_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.final_model_dir = dir.into();
        self
    }

    pub fn with_schema_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_file_path = path.into();
        self
    }

    pub fn with_store_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_root = dir.into();
        self
    }

    pub fn with_target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = column.into();
        self
    }

    pub fn with_collection(mut self, database: impl Into<String>, collection: impl Into<String>) -> Self {
        self.database_name = database.into();
        self.collection_name = collection.into();
        self
    }

    pub fn with_model_menu(mut self, menu: ModelMenu) -> Self {
        self.model_menu = menu;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_training_bucket(mut self, bucket: Option<String>) -> Self {
        self.training_bucket = bucket;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestionConfig {
    pub database_name: String,
    pub collection_name: String,
    pub feature_store_file_path: PathBuf,
    pub training_file_path: PathBuf,
    pub testing_file_path: PathBuf,
    pub train_test_split_ratio: f64,
    pub split_seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    pub schema_file_path: PathBuf,
    pub valid_train_file_path: PathBuf,
    pub valid_test_file_path: PathBuf,
    pub invalid_train_file_path: PathBuf,
    pub invalid_test_file_path: PathBuf,
    pub drift_report_file_path: PathBuf,
    pub drift_threshold: f64,
    pub max_drift_fraction: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformationConfig {
    pub target_column: String,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
    pub transformed_object_file_path: PathBuf,
    /// Copy of the fitted imputer for serving
    pub final_preprocessor_file_path: PathBuf,
    pub imputer: KnnImputerParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    pub trained_model_file_path: PathBuf,
    /// Copy of the bundle for serving
    pub final_model_file_path: PathBuf,
    pub cv_folds: usize,
    pub model_menu: ModelMenu,
}

/// Resolved, immutable configuration of one run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub timestamp: String,
    pub artifact_dir: PathBuf,
    pub final_model_dir: PathBuf,
    pub store_root: PathBuf,
    pub training_bucket: Option<String>,
    pub ingestion: IngestionConfig,
    pub validation: ValidationConfig,
    pub transformation: TransformationConfig,
    pub trainer: TrainerConfig,
}

impl PipelineConfig {
    pub fn new(settings: PipelineSettings, timestamp: NaiveDateTime) -> Self {
        let timestamp = timestamp.format(TIMESTAMP_FORMAT).to_string();
        let artifact_dir = settings.artifact_root.join(&timestamp);

        let ingestion_dir = artifact_dir.join("data_ingestion");
        let validation_dir = artifact_dir.join("data_validation");
        let transformation_dir = artifact_dir.join("data_transformation");
        let trainer_dir = artifact_dir.join("model_trainer");

        let ingestion = IngestionConfig {
            database_name: settings.database_name.clone(),
            collection_name: settings.collection_name.clone(),
            feature_store_file_path: ingestion_dir.join("feature_store").join("phisingData.csv"),
            training_file_path: ingestion_dir.join("ingested").join("train.csv"),
            testing_file_path: ingestion_dir.join("ingested").join("test.csv"),
            train_test_split_ratio: settings.train_test_split_ratio,
            split_seed: settings.split_seed,
        };

        let validation = ValidationConfig {
            schema_file_path: settings.schema_file_path.clone(),
            valid_train_file_path: validation_dir.join("validated").join("train.csv"),
            valid_test_file_path: validation_dir.join("validated").join("test.csv"),
            invalid_train_file_path: validation_dir.join("invalid").join("train.csv"),
            invalid_test_file_path: validation_dir.join("invalid").join("test.csv"),
            drift_report_file_path: validation_dir.join("drift_report").join("report.yaml"),
            drift_threshold: settings.drift_threshold,
            max_drift_fraction: settings.max_drift_fraction,
        };

        let transformation = TransformationConfig {
            target_column: settings.target_column.clone(),
            transformed_train_file_path: transformation_dir.join("transformed").join("train.npy.bin"),
            transformed_test_file_path: transformation_dir.join("transformed").join("test.npy.bin"),
            transformed_object_file_path: transformation_dir.join("transformed_object").join("preprocessing.bin"),
            final_preprocessor_file_path: settings.final_model_dir.join("preprocessor.bin"),
            imputer: settings.imputer.clone(),
        };

        let trainer = TrainerConfig {
            trained_model_file_path: trainer_dir.join("trained_model").join("model.bin"),
            final_model_file_path: settings.final_model_dir.join("model.bin"),
            cv_folds: settings.cv_folds,
            model_menu: settings.model_menu,
        };

        Self {
            timestamp,
            artifact_dir,
            final_model_dir: settings.final_model_dir,
            store_root: settings.store_root,
            training_bucket: settings.training_bucket,
            ingestion,
            validation,
            transformation,
            trainer,
        }
    }

    /// Configuration stamped with the current local time
    pub fn now(settings: PipelineSettings) -> Self {
        Self::new(settings, Local::now().naive_local())
    }
}
