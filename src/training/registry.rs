//! Classifier families and their hyperparameter grids
//!
//! Each [`ModelFamily`] owns a typed grid. [`ModelMenu::candidates`] expands
//! a family's grid into unfitted [`Classifier`]s in a fixed order, so the
//! grid search always sees candidates in the same sequence.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::adaboost::AdaBoostClassifier;
use super::decision_tree::{Criterion, DecisionTree, MaxFeatures, Splitter};
use super::gradient_boosting::{BoostingLoss, GradientBoostingClassifier, GradientBoostingConfig};
use super::linear_models::LogisticRegression;
use super::random_forest::RandomForest;
use crate::error::Result;

/// Seed given to every randomized learner
pub const MODEL_SEED: u64 = 42;

/// The classifier families evaluated by the trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    DecisionTree,
    RandomForest,
    GradientBoosting,
    LogisticRegression,
    AdaBoost,
}

impl ModelFamily {
    /// Menu order; earlier families win ties during selection
    pub const ALL: [ModelFamily; 5] = [
        ModelFamily::DecisionTree,
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::LogisticRegression,
        ModelFamily::AdaBoost,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::DecisionTree => "Decision Tree",
            ModelFamily::RandomForest => "Random Forest",
            ModelFamily::GradientBoosting => "Gradient Boosting",
            ModelFamily::LogisticRegression => "Logistic Regression",
            ModelFamily::AdaBoost => "AdaBoost",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decision tree grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionTreeGrid {
    pub criterion: Vec<Criterion>,
    pub splitter: Vec<Splitter>,
    pub max_features: Vec<MaxFeatures>,
}

impl Default for DecisionTreeGrid {
    fn default() -> Self {
        Self {
            criterion: vec![Criterion::Gini, Criterion::Entropy, Criterion::LogLoss],
            splitter: vec![Splitter::Best, Splitter::Random],
            max_features: vec![MaxFeatures::Sqrt, MaxFeatures::Log2],
        }
    }
}

/// Random forest grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestGrid {
    pub criterion: Vec<Criterion>,
    pub max_features: Vec<MaxFeatures>,
    pub n_estimators: Vec<usize>,
}

impl Default for RandomForestGrid {
    fn default() -> Self {
        Self {
            criterion: vec![Criterion::Gini, Criterion::Entropy, Criterion::LogLoss],
            max_features: vec![MaxFeatures::Sqrt, MaxFeatures::Log2, MaxFeatures::All],
            n_estimators: vec![8, 16, 32, 128, 256],
        }
    }
}

/// Gradient boosting grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingGrid {
    pub loss: Vec<BoostingLoss>,
    pub learning_rate: Vec<f64>,
    pub subsample: Vec<f64>,
    pub max_features: Vec<MaxFeatures>,
    pub n_estimators: Vec<usize>,
}

impl Default for GradientBoostingGrid {
    fn default() -> Self {
        Self {
            loss: vec![BoostingLoss::LogLoss, BoostingLoss::Exponential],
            learning_rate: vec![0.1, 0.01, 0.05, 0.001],
            subsample: vec![0.6, 0.7, 0.75, 0.85, 0.9],
            max_features: vec![MaxFeatures::Sqrt, MaxFeatures::Log2],
            n_estimators: vec![8, 16, 32, 64, 128, 256],
        }
    }
}

/// Logistic regression has nothing to search; its single candidate uses
/// the default parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogisticRegressionGrid {}

/// AdaBoost grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaBoostGrid {
    pub learning_rate: Vec<f64>,
    pub n_estimators: Vec<usize>,
}

impl Default for AdaBoostGrid {
    fn default() -> Self {
        Self {
            learning_rate: vec![0.1, 0.01, 0.001],
            n_estimators: vec![8, 16, 32, 64, 128, 256],
        }
    }
}

/// One grid per family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelMenu {
    pub decision_tree: DecisionTreeGrid,
    pub random_forest: RandomForestGrid,
    pub gradient_boosting: GradientBoostingGrid,
    pub logistic_regression: LogisticRegressionGrid,
    pub ada_boost: AdaBoostGrid,
}

/// An empty axis falls back to the estimator default
fn axis<T: Clone>(values: &[T], default: T) -> Vec<T> {
    if values.is_empty() {
        vec![default]
    } else {
        values.to_vec()
    }
}

impl ModelMenu {
    /// Expand a family's grid into unfitted candidates, last axis varying
    /// fastest.
    pub fn candidates(&self, family: ModelFamily) -> Vec<Classifier> {
        let mut out = Vec::new();
        match family {
            ModelFamily::DecisionTree => {
                let g = &self.decision_tree;
                for criterion in axis(&g.criterion, Criterion::Gini) {
                    for splitter in axis(&g.splitter, Splitter::Best) {
                        for max_features in axis(&g.max_features, MaxFeatures::All) {
                            out.push(Classifier::DecisionTree(
                                DecisionTree::new_classifier()
                                    .with_criterion(criterion)
                                    .with_splitter(splitter)
                                    .with_max_features(max_features)
                                    .with_random_state(MODEL_SEED),
                            ));
                        }
                    }
                }
            }
            ModelFamily::RandomForest => {
                let g = &self.random_forest;
                for criterion in axis(&g.criterion, Criterion::Gini) {
                    for max_features in axis(&g.max_features, MaxFeatures::Sqrt) {
                        for n_estimators in axis(&g.n_estimators, 100) {
                            out.push(Classifier::RandomForest(
                                RandomForest::new(n_estimators)
                                    .with_criterion(criterion)
                                    .with_max_features(max_features)
                                    .with_random_state(MODEL_SEED),
                            ));
                        }
                    }
                }
            }
            ModelFamily::GradientBoosting => {
                let g = &self.gradient_boosting;
                let defaults = GradientBoostingConfig::default();
                for loss in axis(&g.loss, defaults.loss) {
                    for learning_rate in axis(&g.learning_rate, defaults.learning_rate) {
                        for subsample in axis(&g.subsample, defaults.subsample) {
                            for max_features in axis(&g.max_features, defaults.max_features) {
                                for n_estimators in axis(&g.n_estimators, defaults.n_estimators) {
                                    out.push(Classifier::GradientBoosting(GradientBoostingClassifier::new(
                                        GradientBoostingConfig {
                                            n_estimators,
                                            learning_rate,
                                            subsample,
                                            max_features,
                                            loss,
                                            random_state: Some(MODEL_SEED),
                                            ..defaults.clone()
                                        },
                                    )));
                                }
                            }
                        }
                    }
                }
            }
            ModelFamily::LogisticRegression => {
                out.push(Classifier::LogisticRegression(LogisticRegression::new()));
            }
            ModelFamily::AdaBoost => {
                let g = &self.ada_boost;
                for learning_rate in axis(&g.learning_rate, 1.0) {
                    for n_estimators in axis(&g.n_estimators, 50) {
                        out.push(Classifier::AdaBoost(AdaBoostClassifier::new(n_estimators, learning_rate)));
                    }
                }
            }
        }
        out
    }

    /// Number of candidates a family expands to
    pub fn grid_size(&self, family: ModelFamily) -> usize {
        self.candidates(family).len()
    }
}

/// A classifier from one of the menu families
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Classifier {
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    LogisticRegression(LogisticRegression),
    AdaBoost(AdaBoostClassifier),
}

impl Classifier {
    pub fn family(&self) -> ModelFamily {
        match self {
            Classifier::DecisionTree(_) => ModelFamily::DecisionTree,
            Classifier::RandomForest(_) => ModelFamily::RandomForest,
            Classifier::GradientBoosting(_) => ModelFamily::GradientBoosting,
            Classifier::LogisticRegression(_) => ModelFamily::LogisticRegression,
            Classifier::AdaBoost(_) => ModelFamily::AdaBoost,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Classifier::DecisionTree(m) => {
                m.fit(x, y)?;
            }
            Classifier::RandomForest(m) => {
                m.fit(x, y)?;
            }
            Classifier::GradientBoosting(m) => m.fit(x, y)?,
            Classifier::LogisticRegression(m) => {
                m.fit(x, y)?;
            }
            Classifier::AdaBoost(m) => {
                m.fit(x, y)?;
            }
        }
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Classifier::DecisionTree(m) => m.predict(x),
            Classifier::RandomForest(m) => m.predict(x),
            Classifier::GradientBoosting(m) => m.predict(x),
            Classifier::LogisticRegression(m) => m.predict(x),
            Classifier::AdaBoost(m) => m.predict(x),
        }
    }

    /// Searched hyperparameters as `key=value` pairs
    pub fn describe_params(&self) -> String {
        match self {
            Classifier::DecisionTree(m) => format!(
                "criterion={}, splitter={}, max_features={}",
                m.criterion.name(),
                m.splitter.name(),
                m.max_features.name()
            ),
            Classifier::RandomForest(m) => format!(
                "criterion={}, max_features={}, n_estimators={}",
                m.criterion.name(),
                m.max_features.name(),
                m.n_estimators
            ),
            Classifier::GradientBoosting(m) => {
                let c = m.config();
                format!(
                    "loss={}, learning_rate={}, subsample={}, max_features={}, n_estimators={}",
                    c.loss.name(),
                    c.learning_rate,
                    c.subsample,
                    c.max_features.name(),
                    c.n_estimators
                )
            }
            Classifier::LogisticRegression(_) => "default".to_string(),
            Classifier::AdaBoost(m) => {
                format!("learning_rate={}, n_estimators={}", m.learning_rate, m.n_estimators)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid_sizes() {
        let menu = ModelMenu::default();
        assert_eq!(menu.grid_size(ModelFamily::DecisionTree), 12);
        assert_eq!(menu.grid_size(ModelFamily::RandomForest), 45);
        assert_eq!(menu.grid_size(ModelFamily::GradientBoosting), 480);
        assert_eq!(menu.grid_size(ModelFamily::LogisticRegression), 1);
        assert_eq!(menu.grid_size(ModelFamily::AdaBoost), 18);
    }

    #[test]
    fn test_candidates_carry_their_family() {
        let menu = ModelMenu::default();
        for family in ModelFamily::ALL {
            assert!(menu.candidates(family).iter().all(|c| c.family() == family));
        }
    }

    #[test]
    fn test_empty_axis_uses_default() {
        let menu = ModelMenu {
            ada_boost: AdaBoostGrid {
                learning_rate: vec![],
                n_estimators: vec![4],
            },
            ..Default::default()
        };
        let candidates = menu.candidates(ModelFamily::AdaBoost);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].describe_params(), "learning_rate=1, n_estimators=4");
    }

    #[test]
    fn test_menu_from_yaml() {
        let yaml = "decision_tree:\n  criterion: [entropy]\n  splitter: [best]\n  max_features: [all]\n";
        let menu: ModelMenu = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(menu.grid_size(ModelFamily::DecisionTree), 1);
        assert_eq!(menu.random_forest, RandomForestGrid::default());
        assert_eq!(
            menu.candidates(ModelFamily::DecisionTree)[0].describe_params(),
            "criterion=entropy, splitter=best, max_features=all"
        );
    }

    #[test]
    fn test_classifier_fit_predict() {
        let x = ndarray::array![[0.0], [1.0], [2.0], [3.0]];
        let y = ndarray::array![0.0, 0.0, 1.0, 1.0];
        for family in ModelFamily::ALL {
            let mut model = ModelMenu::default().candidates(family).remove(0);
            model.fit(&x, &y).unwrap();
            assert_eq!(model.predict(&x).unwrap().len(), 4, "{}", family);
        }
    }
}
