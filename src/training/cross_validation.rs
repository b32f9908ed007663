//! Cross-validation splitters

use crate::error::{NetsecError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold {
            n_splits: 3,
            shuffle: false,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> CVStrategy {
        self.strategy
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Generate train/test splits over `y.len()` samples
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let (n_splits, shuffle) = match self.strategy {
            CVStrategy::KFold { n_splits, shuffle } | CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                (n_splits, shuffle)
            }
        };

        let n_samples = y.len();
        if n_splits < 2 {
            return Err(NetsecError::TrainingError("n_splits must be at least 2".to_string()));
        }
        if n_samples < n_splits {
            return Err(NetsecError::TrainingError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let folds = match self.strategy {
            CVStrategy::KFold { .. } => self.k_fold(n_samples, n_splits, shuffle),
            CVStrategy::StratifiedKFold { .. } => self.stratified_k_fold(y, n_splits, shuffle),
        };

        Ok(Self::folds_to_splits(folds))
    }

    /// Contiguous folds; the first `n % k` folds get one extra sample.
    fn k_fold(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut folds = Vec::with_capacity(n_splits);
        let mut current = 0;
        for i in 0..n_splits {
            let size = if i < remainder { base + 1 } else { base };
            folds.push(indices[current..current + size].to_vec());
            current += size;
        }
        folds
    }

    /// Deal each class round-robin over the folds, continuing the rotation
    /// from one class to the next so fold sizes stay balanced.
    fn stratified_k_fold(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Vec<Vec<usize>> {
        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        classes.dedup();

        let mut per_class: Vec<Vec<usize>> = vec![Vec::new(); classes.len()];
        for (idx, val) in y.iter().enumerate() {
            if let Some(c) = classes.iter().position(|c| c == val) {
                per_class[c].push(idx);
            }
        }

        if shuffle {
            let mut rng = self.rng();
            for members in per_class.iter_mut() {
                members.shuffle(&mut rng);
            }
        }

        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut slot = 0usize;
        for members in &per_class {
            for &idx in members {
                folds[slot % n_splits].push(idx);
                slot += 1;
            }
        }
        for fold in folds.iter_mut() {
            fold.sort_unstable();
        }
        folds
    }

    fn folds_to_splits(folds: Vec<Vec<usize>>) -> Vec<CVSplit> {
        (0..folds.len())
            .map(|fold_idx| {
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices: folds[fold_idx].clone(),
                    fold_idx,
                }
            })
            .collect()
    }
}
