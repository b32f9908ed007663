//! Decision tree implementation

use crate::error::{NetsecError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Shannon entropy (classification)
    Entropy,
    /// Same impurity as `Entropy`
    LogLoss,
    /// Mean squared error (regression)
    #[serde(rename = "squared_error")]
    MSE,
}

impl Criterion {
    pub fn name(&self) -> &'static str {
        match self {
            Criterion::Gini => "gini",
            Criterion::Entropy => "entropy",
            Criterion::LogLoss => "log_loss",
            Criterion::MSE => "squared_error",
        }
    }
}

/// Split search strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Splitter {
    /// Exhaustive threshold search over every candidate feature
    Best,
    /// One uniformly drawn threshold per candidate feature
    Random,
}

impl Splitter {
    pub fn name(&self) -> &'static str {
        match self {
            Splitter::Best => "best",
            Splitter::Random => "random",
        }
    }
}

/// Number of features considered at each split
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    /// Resolve to a feature count in `1..=n_features`.
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).floor() as usize,
            MaxFeatures::Fixed(n) => *n,
            MaxFeatures::All => n_features,
        };
        n.clamp(1, n_features.max(1))
    }

    pub fn name(&self) -> String {
        match self {
            MaxFeatures::Sqrt => "sqrt".to_string(),
            MaxFeatures::Log2 => "log2".to_string(),
            MaxFeatures::Fraction(f) => format!("{}", f),
            MaxFeatures::Fixed(n) => n.to_string(),
            MaxFeatures::All => "all".to_string(),
        }
    }
}

/// Targets in the form the impurity computations need
struct Targets {
    values: Vec<f64>,
    /// Class index per sample; empty for regression
    labels: Vec<usize>,
    n_classes: usize,
}

/// Running sufficient statistics of one side of a split
#[derive(Debug, Clone)]
struct NodeStats {
    count: usize,
    class_counts: Vec<usize>,
    sum: f64,
    sq_sum: f64,
}

impl NodeStats {
    fn empty(n_classes: usize) -> Self {
        Self {
            count: 0,
            class_counts: vec![0; n_classes],
            sum: 0.0,
            sq_sum: 0.0,
        }
    }

    fn from_indices(targets: &Targets, indices: &[usize]) -> Self {
        let mut stats = Self::empty(targets.n_classes);
        for &i in indices {
            stats.add(targets, i);
        }
        stats
    }

    fn add(&mut self, targets: &Targets, i: usize) {
        self.count += 1;
        if targets.n_classes > 0 {
            self.class_counts[targets.labels[i]] += 1;
        } else {
            let v = targets.values[i];
            self.sum += v;
            self.sq_sum += v * v;
        }
    }

    fn remove(&mut self, targets: &Targets, i: usize) {
        self.count -= 1;
        if targets.n_classes > 0 {
            self.class_counts[targets.labels[i]] -= 1;
        } else {
            let v = targets.values[i];
            self.sum -= v;
            self.sq_sum -= v * v;
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        match criterion {
            Criterion::Gini => {
                1.0 - self
                    .class_counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy | Criterion::LogLoss => -self
                .class_counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.log2()
                })
                .sum::<f64>(),
            Criterion::MSE => (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0),
        }
    }
}

/// Best split found for one feature: (feature, threshold, gain)
type Candidate = (usize, f64, f64);

/// Decision tree model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split
    pub max_features: MaxFeatures,
    /// Impurity criterion
    pub criterion: Criterion,
    pub splitter: Splitter,
    /// Seed for feature sampling and random thresholds
    pub random_state: Option<u64>,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Is classification task
    is_classification: bool,
    /// Classes (for classification)
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            criterion: Criterion::Gini,
            splitter: Splitter::Best,
            random_state: None,
            n_features: 0,
            feature_importances: None,
            is_classification: true,
            classes: Vec::new(),
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_splitter(mut self, splitter: Splitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(NetsecError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(NetsecError::TrainingError(
                "cannot fit a tree on an empty matrix".to_string(),
            ));
        }
        if self.is_classification && self.criterion == Criterion::MSE {
            return Err(NetsecError::TrainingError(
                "squared_error is a regression criterion".to_string(),
            ));
        }
        if !self.is_classification && self.criterion != Criterion::MSE {
            return Err(NetsecError::TrainingError(format!(
                "{} is a classification criterion",
                self.criterion.name()
            )));
        }

        self.n_features = n_features;

        let targets = if self.is_classification {
            let mut classes: Vec<f64> = y.iter().copied().collect();
            classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            classes.dedup();
            let labels = y
                .iter()
                .map(|v| classes.iter().position(|c| c == v).unwrap_or(0))
                .collect();
            let n_classes = classes.len();
            self.classes = classes;
            Targets {
                values: y.to_vec(),
                labels,
                n_classes,
            }
        } else {
            Targets {
                values: y.to_vec(),
                labels: Vec::new(),
                n_classes: 0,
            }
        };

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, &targets, &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        targets: &Targets,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = NodeStats::from_indices(targets, indices);
        let impurity = stats.impurity(self.criterion);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return self.leaf(&stats, n_samples);
        }

        let Some((feature, threshold, gain)) = self.find_best_split(x, targets, indices, &stats, rng) else {
            return self.leaf(&stats, n_samples);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] <= threshold);

        importances[feature] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(x, targets, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, targets, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: feature,
            threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn leaf(&self, stats: &NodeStats, n_samples: usize) -> TreeNode {
        let value = if self.is_classification {
            // Most frequent class; the smallest class wins ties
            let mut best = 0usize;
            for (c, &count) in stats.class_counts.iter().enumerate() {
                if count > stats.class_counts[best] {
                    best = c;
                }
            }
            self.classes.get(best).copied().unwrap_or(0.0)
        } else if stats.count > 0 {
            stats.sum / stats.count as f64
        } else {
            0.0
        };
        TreeNode::Leaf { value, n_samples }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        targets: &Targets,
        indices: &[usize],
        parent: &NodeStats,
        rng: &mut ChaCha8Rng,
    ) -> Option<Candidate> {
        let n_features = x.ncols();
        let k = self.max_features.resolve(n_features);
        let mut features: Vec<usize> = if k < n_features {
            index::sample(rng, n_features, k).into_vec()
        } else {
            (0..n_features).collect()
        };
        features.sort_unstable();

        // Random thresholds are drawn up front so the rng stays sequential
        let thresholds: Vec<Option<f64>> = match self.splitter {
            Splitter::Best => vec![None; features.len()],
            Splitter::Random => features
                .iter()
                .map(|&f| {
                    let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                        (lo.min(x[[i, f]]), hi.max(x[[i, f]]))
                    });
                    (lo < hi).then(|| rng.gen_range(lo..hi))
                })
                .collect(),
        };

        let parent_impurity = parent.impurity(self.criterion);

        let results: Vec<Option<Candidate>> = features
            .par_iter()
            .zip(thresholds.par_iter())
            .map(|(&f, &threshold)| match self.splitter {
                Splitter::Best => self.best_threshold(x, targets, indices, parent, parent_impurity, f),
                Splitter::Random => threshold.and_then(|t| {
                    self.evaluate_threshold(x, targets, indices, parent_impurity, f, t)
                }),
            })
            .collect();

        results.into_iter().flatten().fold(None, |best, cand| match best {
            Some(b) if b.2 >= cand.2 => Some(b),
            _ => Some(cand),
        })
    }

    /// Sorted sweep over one feature.
    fn best_threshold(
        &self,
        x: &Array2<f64>,
        targets: &Targets,
        indices: &[usize],
        parent: &NodeStats,
        parent_impurity: f64,
        feature: usize,
    ) -> Option<Candidate> {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| x[[a, feature]].partial_cmp(&x[[b, feature]]).unwrap_or(Ordering::Equal));

        let n = order.len() as f64;
        let mut left = NodeStats::empty(targets.n_classes);
        let mut right = parent.clone();
        let mut best: Option<Candidate> = None;

        for pos in 0..order.len() - 1 {
            let i = order[pos];
            left.add(targets, i);
            right.remove(targets, i);

            let current = x[[i, feature]];
            let next = x[[order[pos + 1], feature]];
            if next <= current {
                continue;
            }
            if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                continue;
            }

            let weighted = (left.count as f64 * left.impurity(self.criterion)
                + right.count as f64 * right.impurity(self.criterion))
                / n;
            let gain = parent_impurity - weighted;
            if best.map_or(true, |b| gain > b.2) {
                let mut threshold = current + (next - current) / 2.0;
                if threshold >= next {
                    threshold = current;
                }
                best = Some((feature, threshold, gain));
            }
        }

        best
    }

    fn evaluate_threshold(
        &self,
        x: &Array2<f64>,
        targets: &Targets,
        indices: &[usize],
        parent_impurity: f64,
        feature: usize,
        threshold: f64,
    ) -> Option<Candidate> {
        let mut left = NodeStats::empty(targets.n_classes);
        let mut right = NodeStats::empty(targets.n_classes);
        for &i in indices {
            if x[[i, feature]] <= threshold {
                left.add(targets, i);
            } else {
                right.add(targets, i);
            }
        }
        if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
            return None;
        }
        let n = indices.len() as f64;
        let weighted = (left.count as f64 * left.impurity(self.criterion)
            + right.count as f64 * right.impurity(self.criterion))
            / n;
        Some((feature, threshold, parent_impurity - weighted))
    }

    /// Replace every leaf value with `value_of(rows of x reaching that leaf)`.
    ///
    /// Used by boosting to turn a fitted gradient tree into a Newton step.
    pub fn update_leaves<F>(&mut self, x: &Array2<f64>, value_of: F) -> Result<()>
    where
        F: Fn(&[usize]) -> f64,
    {
        let root = self.root.as_mut().ok_or(NetsecError::ModelNotFitted)?;
        let rows: Vec<usize> = (0..x.nrows()).collect();
        Self::update_node(root, x, &rows, &value_of);
        Ok(())
    }

    fn update_node<F>(node: &mut TreeNode, x: &Array2<f64>, rows: &[usize], value_of: &F)
    where
        F: Fn(&[usize]) -> f64,
    {
        match node {
            TreeNode::Leaf { value, .. } => *value = value_of(rows),
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                let (l, r): (Vec<usize>, Vec<usize>) =
                    rows.iter().partition(|&&i| x[[i, *feature_idx]] <= *threshold);
                Self::update_node(left, x, &l, value_of);
                Self::update_node(right, x, &r, value_of);
            }
        }
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(NetsecError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(NetsecError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.rows().into_iter().map(|row| Self::predict_sample(root, row)).collect())
    }

    fn predict_sample(node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
        match node {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    Self::predict_sample(left, sample)
                } else {
                    Self::predict_sample(right, sample)
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => Self::node_depth(node),
        }
    }

    fn node_depth(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + Self::node_depth(left).max(Self::node_depth(right)),
        }
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => Self::count_leaves(node),
        }
    }

    fn count_leaves(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => Self::count_leaves(left) + Self::count_leaves(right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separable() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_random_state(42);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_depth(), 2);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_xor_is_learned() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 1.0, 1.0, 0.0];

        let mut tree = DecisionTree::new_classifier().with_random_state(42);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1e-12, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(2);
        tree.fit(&x, &y).unwrap();
        assert!(tree.get_depth() <= 3);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_random_splitter_is_seeded() {
        let x = Array2::from_shape_fn((40, 4), |(i, j)| ((i * (j + 3)) % 11) as f64);
        let y = Array1::from_shape_fn(40, |i| (i % 2) as f64);

        let fit = |seed| {
            let mut tree = DecisionTree::new_classifier()
                .with_splitter(Splitter::Random)
                .with_max_features(MaxFeatures::Sqrt)
                .with_criterion(Criterion::Entropy)
                .with_random_state(seed);
            tree.fit(&x, &y).unwrap();
            tree
        };

        assert_eq!(fit(7), fit(7));
    }

    #[test]
    fn test_update_leaves() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut tree = DecisionTree::new_regressor().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        tree.update_leaves(&x, |rows| rows.len() as f64 * 10.0).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), array![20.0, 20.0, 20.0, 20.0]);
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(12), 3);
        assert_eq!(MaxFeatures::Log2.resolve(12), 3);
        assert_eq!(MaxFeatures::All.resolve(12), 12);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
        assert_eq!(MaxFeatures::Fixed(50).resolve(12), 12);
    }

    #[test]
    fn test_predict_requires_fit() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(NetsecError::ModelNotFitted)));
    }
}
