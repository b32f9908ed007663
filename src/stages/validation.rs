//! Validation: schema checks, drift detection and routing

use polars::prelude::*;
use std::path::Path;
use tracing::{info, warn};

use crate::artifact::{IngestionArtifact, ValidationArtifact};
use crate::config::ValidationConfig;
use crate::drift::DriftDetector;
use crate::error::{PipelineError, Result, StageContext};
use crate::pipeline::PipelineStage;
use crate::schema::{Schema, SchemaValidator};
use crate::utils::data_loader::{DataLoader, DataSaver};
use crate::utils::persist::write_yaml_file;

pub const TRAIN_COUNT_ERROR: &str = "Train data does not have all the required columns\n";
pub const TEST_COUNT_ERROR: &str = "Test data does not have all the required columns\n";
pub const TRAIN_NAMES_ERROR: &str = "Train data does not have all the required column names\n";
pub const TEST_NAMES_ERROR: &str = "Test data does not have all the required column names\n";
pub const DRIFT_ERROR: &str = "Data drift found in the dataset\n";

pub struct DataValidation<'a> {
    config: &'a ValidationConfig,
    validator: SchemaValidator,
    detector: DriftDetector,
}

impl<'a> DataValidation<'a> {
    /// Reads the schema file once.
    pub fn new(config: &'a ValidationConfig) -> std::result::Result<Self, PipelineError> {
        let schema = Schema::from_yaml_file(&config.schema_file_path).in_stage(PipelineStage::Validation)?;
        Ok(Self::with_schema(config, schema))
    }

    pub fn with_schema(config: &'a ValidationConfig, schema: Schema) -> Self {
        Self {
            config,
            validator: SchemaValidator::new(schema),
            detector: DriftDetector::new(config.drift_threshold, config.max_drift_fraction),
        }
    }

    pub fn validate_column_count(&self, df: &DataFrame) -> bool {
        self.validator.validate_column_count(df)
    }

    pub fn validate_column_names(&self, df: &DataFrame) -> bool {
        self.validator.validate_column_names(df)
    }

    /// KS-test every column of `base` against `current` and persist the report.
    ///
    /// Returns `drift_ok`: true while the drifted fraction stays within the
    /// configured maximum.
    pub fn detect_drift(&self, base: &DataFrame, current: &DataFrame) -> Result<bool> {
        let outcome = self.detector.detect(base, current)?;
        write_yaml_file(&self.config.drift_report_file_path, &outcome.report)?;
        info!(
            path = %self.config.drift_report_file_path.display(),
            drifted = ?outcome.report.drifted_columns(),
            "Drift report written"
        );
        Ok(outcome.drift_ok)
    }

    fn read_data(path: &Path) -> Result<DataFrame> {
        DataLoader::new().load_csv(path)
    }

    fn validate(&self, ingestion: &IngestionArtifact) -> Result<ValidationArtifact> {
        let mut train = Self::read_data(&ingestion.trained_file_path)?;
        let mut test = Self::read_data(&ingestion.test_file_path)?;

        let mut error_message = String::new();
        if !self.validate_column_count(&train) {
            error_message.push_str(TRAIN_COUNT_ERROR);
        }
        if !self.validate_column_count(&test) {
            error_message.push_str(TEST_COUNT_ERROR);
        }
        if !self.validate_column_names(&train) {
            error_message.push_str(TRAIN_NAMES_ERROR);
        }
        if !self.validate_column_names(&test) {
            error_message.push_str(TEST_NAMES_ERROR);
        }

        let drift_ok = self.detect_drift(&train, &test)?;
        if !drift_ok {
            error_message.push_str(DRIFT_ERROR);
        }

        let (train_path, test_path) = if drift_ok {
            (&self.config.valid_train_file_path, &self.config.valid_test_file_path)
        } else {
            (&self.config.invalid_train_file_path, &self.config.invalid_test_file_path)
        };
        DataSaver::save_csv(&mut train, train_path)?;
        DataSaver::save_csv(&mut test, test_path)?;

        let validation_status = error_message.is_empty();
        if !validation_status {
            warn!(errors = %error_message.trim_end(), "Validation failed");
        }

        Ok(ValidationArtifact {
            validation_status,
            valid_train_file_path: self.config.valid_train_file_path.clone(),
            valid_test_file_path: self.config.valid_test_file_path.clone(),
            invalid_train_file_path: self.config.invalid_train_file_path.clone(),
            invalid_test_file_path: self.config.invalid_test_file_path.clone(),
            drift_report_file_path: self.config.drift_report_file_path.clone(),
        })
    }

    pub fn run(&self, ingestion: &IngestionArtifact) -> std::result::Result<ValidationArtifact, PipelineError> {
        info!("Starting data validation");
        let artifact = self.validate(ingestion).in_stage(PipelineStage::Validation)?;
        info!(%artifact, "Data validation completed");
        Ok(artifact)
    }
}
