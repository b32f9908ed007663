//! Model training
//!
//! Provides the classifier families evaluated by the trainer:
//! - Decision trees and Random Forests
//! - Gradient boosting (binary)
//! - Logistic regression
//! - AdaBoost (SAMME)
//!
//! plus the grid search that tunes them, the scoring functions used to pick
//! a winner, and the [`ModelBundle`] that pairs the winner with its imputer.

pub mod adaboost;
pub mod bundle;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod grid_search;
pub mod linear_models;
pub mod metrics;
pub mod random_forest;
pub mod registry;

pub use adaboost::AdaBoostClassifier;
pub use bundle::ModelBundle;
pub use cross_validation::{CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, MaxFeatures, Splitter, TreeNode};
pub use gradient_boosting::{BoostingLoss, GradientBoostingClassifier, GradientBoostingConfig};
pub use grid_search::{CandidateScore, GridSearch, GridSearchResult};
pub use linear_models::LogisticRegression;
pub use metrics::{accuracy_score, classification_score, r2_score, select_best};
pub use random_forest::RandomForest;
pub use registry::{
    AdaBoostGrid, Classifier, DecisionTreeGrid, GradientBoostingGrid, LogisticRegressionGrid, ModelFamily, ModelMenu,
    RandomForestGrid, MODEL_SEED,
};
