//! AdaBoost (Adaptive Boosting) implementation
//!
//! AdaBoost builds an ensemble of weak learners (decision stumps), weighting
//! misclassified samples more heavily in subsequent rounds.

use crate::error::{NetsecError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single decision stump: splits on one feature at one threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Stump {
    feature_index: usize,
    threshold: f64,
    /// Class index when feature <= threshold
    left_class: usize,
    /// Class index when feature > threshold
    right_class: usize,
}

impl Stump {
    fn predict_sample(&self, sample: ArrayView1<f64>) -> usize {
        if sample[self.feature_index] <= self.threshold {
            self.left_class
        } else {
            self.right_class
        }
    }
}

/// AdaBoost Classifier (SAMME variant, supports multi-class)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    stumps: Vec<Stump>,
    alphas: Vec<f64>,
    classes: Vec<f64>,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            learning_rate,
            stumps: Vec::new(),
            alphas: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn is_fitted(&self) -> bool {
        !self.stumps.is_empty()
    }

    /// Number of stumps kept after early stopping
    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }

    /// Weighted class totals per side, by sorted sweep over one feature
    fn best_stump_for_feature(
        x: &Array2<f64>,
        labels: &[usize],
        weights: &Array1<f64>,
        n_classes: usize,
        feature: usize,
    ) -> Option<(Stump, f64)> {
        let n = labels.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| x[[a, feature]].partial_cmp(&x[[b, feature]]).unwrap_or(Ordering::Equal));

        let mut total = vec![0.0; n_classes];
        for i in 0..n {
            total[labels[i]] += weights[i];
        }
        let total_weight: f64 = total.iter().sum();

        let mut left = vec![0.0; n_classes];
        let mut best: Option<(Stump, f64)> = None;

        for pos in 0..n.saturating_sub(1) {
            let i = order[pos];
            left[labels[i]] += weights[i];

            let current = x[[i, feature]];
            let next = x[[order[pos + 1], feature]];
            if next <= current {
                continue;
            }

            let (left_class, left_best) = argmax(&left);
            let right: Vec<f64> = total.iter().zip(left.iter()).map(|(t, l)| t - l).collect();
            let (right_class, right_best) = argmax(&right);
            let error = total_weight - left_best - right_best;

            if best.as_ref().map_or(true, |(_, e)| error < *e) {
                best = Some((
                    Stump {
                        feature_index: feature,
                        threshold: current + (next - current) / 2.0,
                        left_class,
                        right_class,
                    },
                    error,
                ));
            }
        }

        best
    }

    /// Find the best decision stump given sample weights
    fn fit_stump(x: &Array2<f64>, labels: &[usize], weights: &Array1<f64>, n_classes: usize) -> Stump {
        let candidates: Vec<Option<(Stump, f64)>> = (0..x.ncols())
            .into_par_iter()
            .map(|f| Self::best_stump_for_feature(x, labels, weights, n_classes, f))
            .collect();

        let best = candidates.into_iter().flatten().fold(None, |best: Option<(Stump, f64)>, cand| match best {
            Some(b) if b.1 <= cand.1 => Some(b),
            _ => Some(cand),
        });

        match best {
            Some((stump, _)) => stump,
            // Every feature is constant: predict the heaviest class everywhere
            None => {
                let mut totals = vec![0.0; n_classes];
                for (i, &c) in labels.iter().enumerate() {
                    totals[c] += weights[i];
                }
                let (class, _) = argmax(&totals);
                Stump {
                    feature_index: 0,
                    threshold: f64::INFINITY,
                    left_class: class,
                    right_class: class,
                }
            }
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(NetsecError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || x.ncols() == 0 {
            return Err(NetsecError::TrainingError(
                "cannot fit AdaBoost on an empty matrix".to_string(),
            ));
        }

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        classes.dedup();
        let labels: Vec<usize> = y
            .iter()
            .map(|v| classes.iter().position(|c| c == v).unwrap_or(0))
            .collect();
        let n_classes = classes.len();
        self.classes = classes;

        self.stumps.clear();
        self.alphas.clear();

        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);

        for _round in 0..self.n_estimators {
            let stump = Self::fit_stump(x, &labels, &weights, n_classes);

            let wrong: Vec<bool> = (0..n_samples)
                .map(|i| stump.predict_sample(x.row(i)) != labels[i])
                .collect();
            let error: f64 = wrong
                .iter()
                .zip(weights.iter())
                .filter(|(w, _)| **w)
                .map(|(_, &wt)| wt)
                .sum::<f64>()
                / weights.sum();

            // A perfect stump ends boosting with unit weight
            if error <= 0.0 {
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }

            // No better than chance: stop, keeping at least one stump
            if error >= 1.0 - 1.0 / n_classes as f64 {
                if self.stumps.is_empty() {
                    self.stumps.push(stump);
                    self.alphas.push(1.0);
                }
                break;
            }

            // SAMME alpha for multi-class
            let alpha = self.learning_rate
                * (((1.0 - error) / error).ln() + (n_classes as f64 - 1.0).ln());

            for (i, &is_wrong) in wrong.iter().enumerate() {
                if is_wrong {
                    weights[i] *= alpha.exp();
                }
            }
            let w_sum = weights.sum();
            if w_sum > 0.0 {
                weights /= w_sum;
            }

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }

        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(NetsecError::ModelNotFitted);
        }

        let predictions = x
            .rows()
            .into_iter()
            .map(|row| {
                let mut scores = vec![0.0; self.classes.len()];
                for (stump, &alpha) in self.stumps.iter().zip(self.alphas.iter()) {
                    scores[stump.predict_sample(row)] += alpha;
                }
                self.classes[argmax(&scores).0]
            })
            .collect();

        Ok(predictions)
    }

    /// Normalized weighted votes, columns in sorted class order
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(NetsecError::ModelNotFitted);
        }

        let mut proba = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (stump, &alpha) in self.stumps.iter().zip(self.alphas.iter()) {
                proba[[i, stump.predict_sample(row)]] += alpha;
            }
            let total: f64 = proba.row(i).sum();
            if total > 0.0 {
                proba.row_mut(i).mapv_inplace(|v| v / total);
            }
        }
        Ok(proba)
    }
}

/// Index and value of the largest entry; the first one wins ties.
fn argmax(values: &[f64]) -> (usize, f64) {
    let mut best = (0usize, f64::NEG_INFINITY);
    for (i, &v) in values.iter().enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best
}
