//! Error types for the training pipeline

use crate::pipeline::PipelineStage;
use thiserror::Error;

/// Result type alias for pipeline internals
pub type Result<T> = std::result::Result<T, NetsecError>;

/// Main error type for everything below the stage boundary
#[derive(Error, Debug)]
pub enum NetsecError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Document store error: {0}")]
    StoreError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Sync error: {0}")]
    SyncError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,
}

impl From<polars::error::PolarsError> for NetsecError {
    fn from(err: polars::error::PolarsError) -> Self {
        NetsecError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for NetsecError {
    fn from(err: serde_json::Error) -> Self {
        NetsecError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for NetsecError {
    fn from(err: serde_yaml::Error) -> Self {
        NetsecError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for NetsecError {
    fn from(err: bincode::Error) -> Self {
        NetsecError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for NetsecError {
    fn from(err: ndarray::ShapeError) -> Self {
        NetsecError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

/// Error surfaced at a stage boundary.
///
/// Inner helpers propagate [`NetsecError`] with `?`; each stage wraps the
/// failure exactly once with the stage it happened in.
#[derive(Error, Debug)]
#[error("{stage} stage failed")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: NetsecError,
}

impl PipelineError {
    pub fn new(stage: PipelineStage, source: NetsecError) -> Self {
        Self { stage, source }
    }
}

/// Attach a stage to an inner result.
pub trait StageContext<T> {
    fn in_stage(self, stage: PipelineStage) -> std::result::Result<T, PipelineError>;
}

impl<T> StageContext<T> for Result<T> {
    fn in_stage(self, stage: PipelineStage) -> std::result::Result<T, PipelineError> {
        self.map_err(|e| PipelineError::new(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = NetsecError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: NetsecError = io_err.into();
        assert!(matches!(err, NetsecError::IoError(_)));
    }

    #[test]
    fn test_stage_wrapping_keeps_source() {
        let inner: Result<()> = Err(NetsecError::StoreError("unreachable".to_string()));
        let err = inner.in_stage(PipelineStage::Ingestion).unwrap_err();

        assert_eq!(err.stage, PipelineStage::Ingestion);
        assert_eq!(err.to_string(), "ingestion stage failed");
        let source = err.source().expect("source preserved");
        assert_eq!(source.to_string(), "Document store error: unreachable");
    }

    #[test]
    fn test_error_chain_names_cause_once() {
        let inner: Result<()> = Err(NetsecError::StoreError("unreachable".to_string()));
        let err = anyhow::Error::from(inner.in_stage(PipelineStage::Ingestion).unwrap_err());

        let chain = format!("{:#}", err);
        assert_eq!(chain, "ingestion stage failed: Document store error: unreachable");
        assert_eq!(chain.matches("unreachable").count(), 1);
    }
}
