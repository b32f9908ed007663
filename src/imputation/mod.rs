//! Missing value imputation
//!
//! Only the nearest-neighbour imputer is provided. It learns from the training
//! features and fills NaN cells in any matrix with the same column layout.

mod knn;

pub use knn::KNNImputer;

use crate::error::Result;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// How neighbour values are averaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightScheme {
    /// Plain mean of the neighbours
    #[default]
    Uniform,
    /// Inverse-distance weighted mean; exact matches take all the weight
    Distance,
}

/// Distance between rows that may contain missing cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Euclidean over coordinates present in both rows, rescaled by
    /// `n_features / n_present`
    #[default]
    NanEuclidean,
    /// Manhattan with the same rescaling
    Manhattan,
}

/// Imputer parameters as they appear in the pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnnImputerParams {
    pub n_neighbors: usize,
    pub weights: WeightScheme,
    pub metric: DistanceMetric,
}

impl Default for KnnImputerParams {
    fn default() -> Self {
        Self {
            n_neighbors: 3,
            weights: WeightScheme::Uniform,
            metric: DistanceMetric::NanEuclidean,
        }
    }
}

/// Trait for imputers
pub trait Imputer: Send + Sync {
    /// Fit the imputer on data with missing values
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Transform data by imputing missing values
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Fit and transform in one step
    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Check if value is missing (NaN)
#[inline]
pub fn is_missing(v: f64) -> bool {
    v.is_nan()
}
