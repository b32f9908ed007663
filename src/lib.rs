//! netsec-pipeline - batch training pipeline for network security data
//!
//! Pulls records from a document store, validates them against a schema and
//! for distribution drift, imputes missing values and selects the best of
//! several tuned classifiers.
//!
//! # Modules
//!
//! ## Pipeline
//! - [`pipeline`] - Stage orchestration
//! - [`stages`] - Ingestion, validation, transformation, training
//! - [`artifact`] - Records handed between stages
//! - [`config`] - Settings and per-run paths
//!
//! ## ML
//! - [`schema`] - Column schema checks
//! - [`drift`] - Kolmogorov-Smirnov drift detection
//! - [`imputation`] - KNN imputer
//! - [`training`] - Classifiers, grid search, model bundle
//!
//! ## Infrastructure
//! - [`store`] - Document store access
//! - [`sync`] - Object storage sync
//! - [`utils`] - CSV, YAML and binary persistence
//! - [`cli`] - Command-line interface

pub mod error;

pub mod artifact;
pub mod config;
pub mod pipeline;
pub mod stages;

pub mod drift;
pub mod imputation;
pub mod schema;
pub mod training;

pub mod cli;
pub mod store;
pub mod sync;
pub mod utils;

pub use error::{NetsecError, PipelineError, Result};
