//! The four pipeline stages
//!
//! Each stage borrows its slice of the run configuration, consumes the
//! previous stage's artifact and returns its own. Failures leave a stage as
//! a [`PipelineError`](crate::error::PipelineError) tagged with that stage.

pub mod ingestion;
pub mod trainer;
pub mod transformation;
pub mod validation;

pub use ingestion::{documents_to_frame, DataIngestion};
pub use trainer::{FamilyEvaluation, ModelTrainer};
pub use transformation::{remap_target, DataTransformation};
pub use validation::DataValidation;
