//! Pipeline orchestration
//!
//! Runs Ingestion -> Validation -> Transformation -> Training in order,
//! handing each artifact to the next stage. The first failure aborts the
//! run. When a bucket is configured the artifact directory and the final
//! model directory are synced afterwards; sync failures are only logged.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::artifact::{
    IngestionArtifact, ModelTrainerArtifact, TransformationArtifact, ValidationArtifact,
};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::stages::{DataIngestion, DataTransformation, DataValidation, ModelTrainer};
use crate::store::{DocumentStore, JsonFileStore};
use crate::sync::{ArtifactSync, NoopSync, S3CliSync};

/// Steps of a run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Ingestion,
    Validation,
    Transformation,
    Training,
    SyncArtifacts,
    SyncFinalModel,
}

impl PipelineStage {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Ingestion => "ingestion",
            PipelineStage::Validation => "validation",
            PipelineStage::Transformation => "transformation",
            PipelineStage::Training => "training",
            PipelineStage::SyncArtifacts => "sync_artifacts",
            PipelineStage::SyncFinalModel => "sync_final_model",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every artifact of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub ingestion: IngestionArtifact,
    pub validation: ValidationArtifact,
    pub transformation: TransformationArtifact,
    pub trainer: ModelTrainerArtifact,
}

pub struct TrainingPipeline {
    config: PipelineConfig,
    store: Box<dyn DocumentStore>,
    sync: Box<dyn ArtifactSync>,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig, store: Box<dyn DocumentStore>, sync: Box<dyn ArtifactSync>) -> Self {
        Self { config, store, sync }
    }

    /// JSON file store at `store_root`; S3 sync when a bucket is configured.
    pub fn from_config(config: PipelineConfig) -> Self {
        let store = Box::new(JsonFileStore::new(config.store_root.clone()));
        let sync: Box<dyn ArtifactSync> = if config.training_bucket.is_some() {
            Box::new(S3CliSync::new())
        } else {
            Box::new(NoopSync)
        };
        Self::new(config, store, sync)
    }

    /// Replace the sync backend
    pub fn with_sync(mut self, sync: Box<dyn ArtifactSync>) -> Self {
        self.sync = sync;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn start_data_ingestion(&self) -> Result<IngestionArtifact, PipelineError> {
        DataIngestion::new(&self.config.ingestion, self.store.as_ref()).run()
    }

    pub fn start_data_validation(&self, ingestion: &IngestionArtifact) -> Result<ValidationArtifact, PipelineError> {
        DataValidation::new(&self.config.validation)?.run(ingestion)
    }

    pub fn start_data_transformation(
        &self,
        validation: &ValidationArtifact,
    ) -> Result<TransformationArtifact, PipelineError> {
        DataTransformation::new(&self.config.transformation).run(validation)
    }

    pub fn start_model_trainer(
        &self,
        transformation: &TransformationArtifact,
    ) -> Result<ModelTrainerArtifact, PipelineError> {
        ModelTrainer::new(&self.config.trainer).run(transformation)
    }

    fn sync_step(&self, stage: PipelineStage, prefix: &str) {
        let Some(bucket) = self.config.training_bucket.as_deref() else {
            return;
        };
        let local = match stage {
            PipelineStage::SyncFinalModel => &self.config.final_model_dir,
            _ => &self.config.artifact_dir,
        };
        let remote = S3CliSync::remote_url(bucket, prefix, &self.config.timestamp);
        if let Err(e) = self.sync.sync_folder(local, &remote) {
            warn!(stage = %stage, remote = %remote, error = %e, "Sync failed");
        }
    }

    pub fn sync_artifact_dir(&self) {
        self.sync_step(PipelineStage::SyncArtifacts, "artifact");
    }

    pub fn sync_final_model_dir(&self) {
        self.sync_step(PipelineStage::SyncFinalModel, "final_model");
    }

    pub fn run(&self) -> Result<PipelineOutcome, PipelineError> {
        self.run_with_progress(|_, _| {})
    }

    /// Like [`run`](Self::run), calling `on_stage` with each artifact as soon
    /// as its stage finishes.
    pub fn run_with_progress<F>(&self, mut on_stage: F) -> Result<PipelineOutcome, PipelineError>
    where
        F: FnMut(PipelineStage, &dyn fmt::Display),
    {
        info!(artifact_dir = %self.config.artifact_dir.display(), "Starting training pipeline");

        let ingestion = self.start_data_ingestion()?;
        on_stage(PipelineStage::Ingestion, &ingestion);
        let validation = self.start_data_validation(&ingestion)?;
        on_stage(PipelineStage::Validation, &validation);
        let transformation = self.start_data_transformation(&validation)?;
        on_stage(PipelineStage::Transformation, &transformation);
        let trainer = self.start_model_trainer(&transformation)?;
        on_stage(PipelineStage::Training, &trainer);

        self.sync_artifact_dir();
        self.sync_final_model_dir();

        info!("Training pipeline completed");
        Ok(PipelineOutcome {
            ingestion,
            validation,
            transformation,
            trainer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(PipelineStage::Ingestion.to_string(), "ingestion");
        assert_eq!(PipelineStage::SyncFinalModel.to_string(), "sync_final_model");
    }
}
