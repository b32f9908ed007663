//! Artifact records handed from one stage to the next
//!
//! Every artifact only carries paths; the in-memory frames never cross a
//! stage boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Output of the ingestion stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionArtifact {
    pub trained_file_path: PathBuf,
    pub test_file_path: PathBuf,
}

/// Output of the validation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationArtifact {
    /// True iff no structural error and no drift failure was recorded
    pub validation_status: bool,
    pub valid_train_file_path: PathBuf,
    pub valid_test_file_path: PathBuf,
    pub invalid_train_file_path: PathBuf,
    pub invalid_test_file_path: PathBuf,
    pub drift_report_file_path: PathBuf,
}

/// Output of the transformation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationArtifact {
    pub transformed_object_file_path: PathBuf,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
}

/// Binary classification scores, all in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetricArtifact {
    pub f1_score: f64,
    pub precision_score: f64,
    pub recall_score: f64,
}

/// Output of the training stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTrainerArtifact {
    pub trained_model_file_path: PathBuf,
    pub train_metric: ClassificationMetricArtifact,
    pub test_metric: ClassificationMetricArtifact,
}

impl fmt::Display for IngestionArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IngestionArtifact(trained_file_path={}, test_file_path={})",
            self.trained_file_path.display(),
            self.test_file_path.display()
        )
    }
}

impl fmt::Display for ValidationArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ValidationArtifact(validation_status={}, valid_train_file_path={}, valid_test_file_path={}, \
             invalid_train_file_path={}, invalid_test_file_path={}, drift_report_file_path={})",
            self.validation_status,
            self.valid_train_file_path.display(),
            self.valid_test_file_path.display(),
            self.invalid_train_file_path.display(),
            self.invalid_test_file_path.display(),
            self.drift_report_file_path.display()
        )
    }
}

impl fmt::Display for TransformationArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransformationArtifact(transformed_object_file_path={}, transformed_train_file_path={}, \
             transformed_test_file_path={})",
            self.transformed_object_file_path.display(),
            self.transformed_train_file_path.display(),
            self.transformed_test_file_path.display()
        )
    }
}

impl fmt::Display for ClassificationMetricArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "f1={:.4} precision={:.4} recall={:.4}",
            self.f1_score, self.precision_score, self.recall_score
        )
    }
}

impl fmt::Display for ModelTrainerArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModelTrainerArtifact(trained_model_file_path={}, train=[{}], test=[{}])",
            self.trained_model_file_path.display(),
            self.train_metric,
            self.test_metric
        )
    }
}
