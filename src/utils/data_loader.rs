//! Data loading utilities
//!
//! Delimited files are the interchange format between ingestion, validation
//! and transformation, so everything here goes through polars' CSV reader and
//! writer with a header row.

use crate::error::{NetsecError, Result};
use crate::utils::ensure_parent_dir;
use ndarray::Array2;
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs::File;
use std::path::Path;

/// CSV loader with a configurable schema inference window
pub struct DataLoader {
    /// Rows scanned for type inference; `None` scans the whole file
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader that infers types from the whole file
    pub fn new() -> Self {
        Self {
            infer_schema_length: None,
        }
    }

    /// Limit type inference to the first `n` rows
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = Some(n);
        self
    }

    /// Load a comma-separated file with a header row
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            NetsecError::DataError(format!("cannot open {}: {}", path.display(), e))
        })?;

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| NetsecError::DataError(format!("cannot parse {}: {}", path.display(), e)))
    }
}

/// Writes frames back out in the interchange format
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV with a header row, creating parent directories as needed
    pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
        ensure_parent_dir(path)?;
        let mut file = File::create(path)?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .map_err(|e| NetsecError::DataError(format!("cannot write {}: {}", path.display(), e)))
    }
}

/// Column names in frame order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns().iter().map(|s| s.name().to_string()).collect()
}

/// Shuffle rows with a fixed seed and split them into (train, test).
///
/// The test partition takes `ceil(n * test_ratio)` rows, the train partition
/// takes the rest; both must be non-empty.
pub fn train_test_split(df: &DataFrame, test_ratio: f64, seed: u64) -> Result<(DataFrame, DataFrame)> {
    if !(0.0..1.0).contains(&test_ratio) || test_ratio == 0.0 {
        return Err(NetsecError::ConfigError(format!(
            "test ratio must be in (0, 1), got {}",
            test_ratio
        )));
    }

    let n_rows = df.height();
    let n_test = (n_rows as f64 * test_ratio).ceil() as usize;
    let n_train = n_rows.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(NetsecError::DataError(format!(
            "cannot split {} rows with test ratio {}",
            n_rows, test_ratio
        )));
    }

    let mut indices: Vec<IdxSize> = (0..n_rows as IdxSize).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_idx = IdxCa::from_vec("idx".into(), indices[..n_test].to_vec());
    let train_idx = IdxCa::from_vec("idx".into(), indices[n_test..].to_vec());

    Ok((df.take(&train_idx)?, df.take(&test_idx)?))
}

/// Cast one column to `f64`, with nulls (and unparseable strings) as NaN.
pub fn column_to_vec(series: &Series) -> Result<Vec<f64>> {
    let casted = series.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Materialize a frame as a dense row-major numeric matrix.
pub fn frame_to_array(df: &DataFrame) -> Result<Array2<f64>> {
    let (n_rows, n_cols) = df.shape();
    let mut out = Array2::from_elem((n_rows, n_cols), f64::NAN);

    for (j, series) in df.get_columns().iter().enumerate() {
        for (i, value) in column_to_vec(series)?.into_iter().enumerate() {
            out[[i, j]] = value;
        }
    }

    Ok(out)
}
