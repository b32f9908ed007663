//! Gradient boosting for binary classification
//!
//! Each round fits a shallow regression tree to the negative gradient of the
//! loss on a row subsample, replaces its leaf values with a Newton step and
//! adds the shrunken output to the raw score of every row.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::{DecisionTree, MaxFeatures};
use crate::error::{NetsecError, Result};

/// Boosting loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostingLoss {
    /// Binomial deviance
    LogLoss,
    /// AdaBoost-style exponential loss
    Exponential,
}

impl BoostingLoss {
    pub fn name(&self) -> &'static str {
        match self {
            BoostingLoss::LogLoss => "log_loss",
            BoostingLoss::Exponential => "exponential",
        }
    }
}

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row fraction drawn for each tree
    pub subsample: f64,
    /// Features considered per split
    pub max_features: MaxFeatures,
    pub loss: BoostingLoss,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            max_features: MaxFeatures::All,
            loss: BoostingLoss::LogLoss,
            random_state: Some(42),
        }
    }
}

/// Gradient Boosting Classifier (binary)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_score: f64,
    classes: Vec<f64>,
    feature_importances: Vec<f64>,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_score: 0.0,
            classes: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        !self.classes.is_empty()
    }

    /// Fit binary classification
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(NetsecError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(NetsecError::TrainingError(
                "cannot fit gradient boosting on an empty matrix".to_string(),
            ));
        }
        if !(self.config.subsample > 0.0 && self.config.subsample <= 1.0) {
            return Err(NetsecError::TrainingError(format!(
                "subsample must be in (0, 1], got {}",
                self.config.subsample
            )));
        }

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        classes.dedup();
        if classes.len() > 2 {
            return Err(NetsecError::TrainingError(format!(
                "gradient boosting supports binary targets, found {} classes",
                classes.len()
            )));
        }
        self.classes = classes;
        self.trees.clear();
        self.feature_importances = vec![0.0; n_features];

        if self.classes.len() == 1 {
            return Ok(());
        }

        // Positive class is the larger label
        let positive = self.classes[1];
        let y01: Array1<f64> = y.mapv(|v| if v == positive { 1.0 } else { 0.0 });

        let prior = (y01.sum() / n_samples as f64).clamp(1e-12, 1.0 - 1e-12);
        let log_odds = (prior / (1.0 - prior)).ln();
        self.initial_score = match self.config.loss {
            BoostingLoss::LogLoss => log_odds,
            BoostingLoss::Exponential => 0.5 * log_odds,
        };

        let mut raw = Array1::from_elem(n_samples, self.initial_score);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        for _ in 0..self.config.n_estimators {
            let gradient: Array1<f64> = match self.config.loss {
                BoostingLoss::LogLoss => y01
                    .iter()
                    .zip(raw.iter())
                    .map(|(&yi, &fi)| yi - sigmoid(fi))
                    .collect(),
                BoostingLoss::Exponential => y01
                    .iter()
                    .zip(raw.iter())
                    .map(|(&yi, &fi)| {
                        let sign = 2.0 * yi - 1.0;
                        sign * (-sign * fi).exp()
                    })
                    .collect(),
            };

            let rows = self.subsample_indices(n_samples, &mut rng);
            let x_sub = x.select(Axis(0), &rows);
            let g_sub: Array1<f64> = rows.iter().map(|&i| gradient[i]).collect();

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_max_features(self.config.max_features)
                .with_random_state(rng.gen());
            tree.fit(&x_sub, &g_sub)?;

            // One Newton step per leaf instead of the mean gradient
            let loss = self.config.loss;
            tree.update_leaves(&x_sub, |local| {
                let (mut num, mut den) = (0.0, 0.0);
                for &k in local {
                    let i = rows[k];
                    match loss {
                        BoostingLoss::LogLoss => {
                            let p = sigmoid(raw[i]);
                            num += y01[i] - p;
                            den += p * (1.0 - p);
                        }
                        BoostingLoss::Exponential => {
                            let sign = 2.0 * y01[i] - 1.0;
                            let w = (-sign * raw[i]).exp();
                            num += sign * w;
                            den += w;
                        }
                    }
                }
                if den.abs() < 1e-150 {
                    0.0
                } else {
                    num / den
                }
            })?;

            let update = tree.predict(x)?;
            raw.scaled_add(self.config.learning_rate, &update);

            if let Some(importance) = tree.feature_importances() {
                for (j, &v) in importance.iter().enumerate() {
                    self.feature_importances[j] += v;
                }
            }
            self.trees.push(tree);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.classes.len() == 1 {
            return Ok(Array1::from_elem(x.nrows(), self.classes[0]));
        }
        let probs = self.predict_proba(x)?;
        Ok(probs.mapv(|p| if p > 0.5 { self.classes[1] } else { self.classes[0] }))
    }

    /// Probability of the positive (larger) class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(NetsecError::ModelNotFitted);
        }

        let mut raw = Array1::from_elem(x.nrows(), self.initial_score);
        for tree in &self.trees {
            raw.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }

        Ok(match self.config.loss {
            BoostingLoss::LogLoss => raw.mapv(sigmoid),
            BoostingLoss::Exponential => raw.mapv(|f| sigmoid(2.0 * f)),
        })
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = (((n as f64) * self.config.subsample).floor() as usize).max(1);
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }
}
