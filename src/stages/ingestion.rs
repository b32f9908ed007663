//! Ingestion: document store -> feature store -> train/test CSV

use polars::prelude::*;
use serde_json::Value;
use tracing::info;

use crate::artifact::IngestionArtifact;
use crate::config::IngestionConfig;
use crate::error::{NetsecError, PipelineError, Result, StageContext};
use crate::pipeline::PipelineStage;
use crate::store::{Document, DocumentStore};
use crate::utils::data_loader::{train_test_split, DataSaver};

/// Column added by the document store to every record
pub const ID_COLUMN: &str = "_id";

/// Sentinel string the source data uses for missing values
pub const NA_SENTINEL: &str = "na";

pub struct DataIngestion<'a> {
    config: &'a IngestionConfig,
    store: &'a dyn DocumentStore,
}

impl<'a> DataIngestion<'a> {
    pub fn new(config: &'a IngestionConfig, store: &'a dyn DocumentStore) -> Self {
        Self { config, store }
    }

    /// Fetch the whole collection as a frame, without the id column
    pub fn export_collection_as_frame(&self) -> Result<DataFrame> {
        let documents = self
            .store
            .fetch_all(&self.config.database_name, &self.config.collection_name)?;
        info!(
            database = %self.config.database_name,
            collection = %self.config.collection_name,
            documents = documents.len(),
            "Fetched collection"
        );
        if documents.is_empty() {
            return Err(NetsecError::StoreError(format!(
                "collection {}.{} is empty",
                self.config.database_name, self.config.collection_name
            )));
        }
        documents_to_frame(&documents)
    }

    pub fn export_to_feature_store(&self, df: &mut DataFrame) -> Result<()> {
        DataSaver::save_csv(df, &self.config.feature_store_file_path)?;
        info!(path = %self.config.feature_store_file_path.display(), rows = df.height(), "Feature store written");
        Ok(())
    }

    pub fn split_data_as_train_test(&self, df: &DataFrame) -> Result<()> {
        let (mut train, mut test) = train_test_split(df, self.config.train_test_split_ratio, self.config.split_seed)?;
        info!(train = train.height(), test = test.height(), "Performed train test split");

        DataSaver::save_csv(&mut train, &self.config.training_file_path)?;
        DataSaver::save_csv(&mut test, &self.config.testing_file_path)?;
        Ok(())
    }

    fn ingest(&self) -> Result<IngestionArtifact> {
        let mut df = self.export_collection_as_frame()?;
        self.export_to_feature_store(&mut df)?;
        self.split_data_as_train_test(&df)?;

        Ok(IngestionArtifact {
            trained_file_path: self.config.training_file_path.clone(),
            test_file_path: self.config.testing_file_path.clone(),
        })
    }

    pub fn run(&self) -> std::result::Result<IngestionArtifact, PipelineError> {
        info!("Starting data ingestion");
        let artifact = self.ingest().in_stage(PipelineStage::Ingestion)?;
        info!(%artifact, "Data ingestion completed");
        Ok(artifact)
    }
}

/// Inferred type of one document field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum FieldKind {
    Int,
    Float,
    Text,
}

fn field_kind(value: &Value) -> FieldKind {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => FieldKind::Int,
        Value::Number(_) => FieldKind::Float,
        _ => FieldKind::Text,
    }
}

/// `None` for absent, null and `"na"` cells
fn cell(document: &Document, column: &str) -> Option<Value> {
    match document.get(column) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s == NA_SENTINEL => None,
        Some(v) => Some(v.clone()),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build a frame from documents.
///
/// Columns follow first appearance across documents and `_id` is dropped.
/// A column is Int64 when every present value is an integer, Float64 when
/// every present value is numeric and String otherwise.
pub fn documents_to_frame(documents: &[Document]) -> Result<DataFrame> {
    let mut columns: Vec<String> = Vec::new();
    for document in documents {
        for key in document.keys() {
            if key != ID_COLUMN && !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    if columns.is_empty() {
        return Err(NetsecError::StoreError("documents have no fields".to_string()));
    }

    let mut series = Vec::with_capacity(columns.len());
    for name in &columns {
        let cells: Vec<Option<Value>> = documents.iter().map(|d| cell(d, name)).collect();
        let kind = cells.iter().flatten().map(field_kind).max().unwrap_or(FieldKind::Float);

        let s = match kind {
            FieldKind::Int => {
                let values: Vec<Option<i64>> = cells.iter().map(|c| c.as_ref().and_then(Value::as_i64)).collect();
                Series::new(name.as_str().into(), values)
            }
            FieldKind::Float => {
                let values: Vec<Option<f64>> = cells.iter().map(|c| c.as_ref().and_then(Value::as_f64)).collect();
                Series::new(name.as_str().into(), values)
            }
            FieldKind::Text => {
                let values: Vec<Option<String>> = cells.iter().map(|c| c.as_ref().map(text)).collect();
                Series::new(name.as_str().into(), values)
            }
        };
        series.push(s);
    }

    Ok(DataFrame::new(series)?)
}
