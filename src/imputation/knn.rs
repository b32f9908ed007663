//! KNN-based imputation

use crate::error::{NetsecError, Result};
use crate::imputation::{is_missing, DistanceMetric, Imputer, KnnImputerParams, WeightScheme};
use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// KNN-based imputer
///
/// Every training row is kept after `fit`. For a missing cell `(i, j)` the
/// donors are the training rows whose column `j` is present; the `k` closest
/// donors (ties broken by row order) are averaged. When no donor is reachable
/// the training mean of column `j` is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNNImputer {
    /// Number of neighbors
    n_neighbors: usize,
    weights: WeightScheme,
    metric: DistanceMetric,
    /// Training rows, missing cells included
    fit_data: Option<Array2<f64>>,
    /// Per-column mean over present training values
    column_means: Option<Array1<f64>>,
}

impl KNNImputer {
    /// Create new KNN imputer
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            weights: WeightScheme::Uniform,
            metric: DistanceMetric::NanEuclidean,
            fit_data: None,
            column_means: None,
        }
    }

    pub fn from_params(params: &KnnImputerParams) -> Self {
        Self::new(params.n_neighbors)
            .with_weights(params.weights)
            .with_metric(params.metric)
    }

    /// Set distance metric
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set weighting scheme
    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    pub fn is_fitted(&self) -> bool {
        self.fit_data.is_some()
    }

    /// Number of feature columns seen during `fit`
    pub fn n_features(&self) -> Option<usize> {
        self.fit_data.as_ref().map(|d| d.ncols())
    }

    /// Distance over the coordinates present in both rows; NaN when none are.
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let n_features = a.len();
        let mut present = 0usize;
        let mut accum = 0.0f64;

        for (&ai, &bi) in a.iter().zip(b.iter()) {
            if is_missing(ai) || is_missing(bi) {
                continue;
            }
            present += 1;
            let d = ai - bi;
            accum += match self.metric {
                DistanceMetric::NanEuclidean => d * d,
                DistanceMetric::Manhattan => d.abs(),
            };
        }

        if present == 0 {
            return f64::NAN;
        }

        let scaled = accum * n_features as f64 / present as f64;
        match self.metric {
            DistanceMetric::NanEuclidean => scaled.sqrt(),
            DistanceMetric::Manhattan => scaled,
        }
    }

    /// Average the donor values of column `j` over the `k` nearest donors.
    fn impute_value(&self, data: &Array2<f64>, distances: &[f64], j: usize, fallback: f64) -> f64 {
        let mut donors: Vec<(f64, usize)> = distances
            .iter()
            .enumerate()
            .filter(|&(r, d)| !d.is_nan() && !is_missing(data[[r, j]]))
            .map(|(r, &d)| (d, r))
            .collect();

        if donors.is_empty() {
            return fallback;
        }

        donors.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));
        donors.truncate(self.n_neighbors);

        match self.weights {
            WeightScheme::Uniform => {
                let sum: f64 = donors.iter().map(|&(_, r)| data[[r, j]]).sum();
                sum / donors.len() as f64
            }
            WeightScheme::Distance => {
                // Exact matches take all the weight
                let exact: Vec<usize> = donors
                    .iter()
                    .filter(|(d, _)| *d == 0.0)
                    .map(|&(_, r)| r)
                    .collect();
                if !exact.is_empty() {
                    let sum: f64 = exact.iter().map(|&r| data[[r, j]]).sum();
                    return sum / exact.len() as f64;
                }

                let mut weighted_sum = 0.0;
                let mut weight_sum = 0.0;
                for &(d, r) in &donors {
                    let weight = 1.0 / d;
                    weighted_sum += data[[r, j]] * weight;
                    weight_sum += weight;
                }
                if weight_sum > 0.0 {
                    weighted_sum / weight_sum
                } else {
                    fallback
                }
            }
        }
    }
}

impl Default for KNNImputer {
    fn default() -> Self {
        Self::from_params(&KnnImputerParams::default())
    }
}

impl Imputer for KNNImputer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(NetsecError::DataError(
                "cannot fit KNN imputer on an empty matrix".to_string(),
            ));
        }

        let mut means = Array1::zeros(x.ncols());
        for (j, column) in x.axis_iter(Axis(1)).enumerate() {
            let present: Vec<f64> = column.iter().copied().filter(|v| !is_missing(*v)).collect();
            if present.is_empty() {
                return Err(NetsecError::DataError(format!(
                    "feature column {} is entirely missing in the training data",
                    j
                )));
            }
            means[j] = present.iter().sum::<f64>() / present.len() as f64;
        }

        self.fit_data = Some(x.clone());
        self.column_means = Some(means);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (data, means) = match (&self.fit_data, &self.column_means) {
            (Some(d), Some(m)) => (d, m),
            _ => return Err(NetsecError::ModelNotFitted),
        };

        if x.ncols() != data.ncols() {
            return Err(NetsecError::ShapeError {
                expected: format!("{} columns", data.ncols()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut result = x.clone();
        result
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|mut row| {
                if !row.iter().any(|&v| is_missing(v)) {
                    return;
                }

                let distances: Vec<f64> = data
                    .rows()
                    .into_iter()
                    .map(|donor| self.distance(row.view(), donor))
                    .collect();

                for j in 0..row.len() {
                    if is_missing(row[j]) {
                        row[j] = self.impute_value(data, &distances, j, means[j]);
                    }
                }
            });

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_knn_imputer_basic() {
        let data = Array2::from_shape_vec(
            (6, 2),
            vec![
                1.0, 10.0,
                2.0, 20.0,
                3.0, 30.0,
                4.0, 40.0,
                f64::NAN, 25.0,
                2.5, f64::NAN,
            ],
        )
        .unwrap();

        let mut imputer = KNNImputer::new(3);
        let result = imputer.fit_transform(&data).unwrap();

        assert!(!result.iter().any(|&v| v.is_nan()));
        assert!(result[[4, 0]] >= 1.0 && result[[4, 0]] <= 4.0);
        assert!(result[[5, 1]] >= 10.0 && result[[5, 1]] <= 40.0);
    }

    #[test]
    fn test_uniform_uses_nearest_donors() {
        // Row 3 is closest to rows 0 and 1 on the present coordinate
        let data = array![
            [0.0, 1.0],
            [0.1, 3.0],
            [10.0, 100.0],
            [0.05, f64::NAN],
        ];

        let mut imputer = KNNImputer::new(2);
        let result = imputer.fit_transform(&data).unwrap();
        assert!((result[[3, 1]] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_weights_exact_match() {
        let data = array![
            [0.0, 5.0],
            [1.0, 1.0],
            [2.0, 2.0],
            [0.0, f64::NAN],
        ];

        let mut imputer = KNNImputer::new(3).with_weights(WeightScheme::Distance);
        let result = imputer.fit_transform(&data).unwrap();
        assert_eq!(result[[3, 1]], 5.0);
    }

    #[test]
    fn test_nan_euclidean_rescales_by_present_coordinates() {
        let imputer = KNNImputer::new(1);
        let a = array![3.0, f64::NAN, 0.0];
        let b = array![0.0, 1.0, 4.0];
        // sqrt(3/2 * (9 + 16))
        let d = imputer.distance(a.view(), b.view());
        assert!((d - (1.5f64 * 25.0).sqrt()).abs() < 1e-12);

        let none = imputer.distance(array![f64::NAN, 1.0].view(), array![1.0, f64::NAN].view());
        assert!(none.is_nan());
    }

    #[test]
    fn test_mean_fallback_without_donors() {
        let train = array![[1.0, 2.0], [3.0, 4.0]];
        let mut imputer = KNNImputer::new(3);
        imputer.fit(&train).unwrap();

        // No overlapping coordinate with any training row
        let test = array![[f64::NAN, f64::NAN]];
        let result = imputer.transform(&test).unwrap();
        assert_eq!(result[[0, 0]], 2.0);
        assert_eq!(result[[0, 1]], 3.0);
    }

    #[test]
    fn test_entirely_missing_column_fails() {
        let data = array![[1.0, f64::NAN], [2.0, f64::NAN]];
        let mut imputer = KNNImputer::new(3);
        assert!(matches!(imputer.fit(&data), Err(NetsecError::DataError(_))));
    }

    #[test]
    fn test_transform_requires_fit_and_matching_width() {
        let imputer = KNNImputer::new(3);
        assert!(matches!(
            imputer.transform(&array![[1.0]]),
            Err(NetsecError::ModelNotFitted)
        ));

        let mut imputer = KNNImputer::new(3);
        imputer.fit(&array![[1.0, 2.0]]).unwrap();
        assert!(imputer.transform(&array![[1.0, 2.0, 3.0]]).is_err());
    }

    #[test]
    fn test_complete_rows_pass_through() {
        let data = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let mut imputer = KNNImputer::default();
        let result = imputer.fit_transform(&data).unwrap();
        assert_eq!(result, data);
    }

    #[test]
    fn test_manhattan_metric() {
        let data = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [1.5, f64::NAN]];
        let mut imputer = KNNImputer::new(2).with_metric(DistanceMetric::Manhattan);
        let result = imputer.fit_transform(&data).unwrap();
        assert!((result[[3, 1]] - 1.5).abs() < 1e-12);
    }
}
