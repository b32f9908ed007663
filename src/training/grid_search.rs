//! Exhaustive grid search with cross-validated accuracy

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use tracing::{debug, warn};

use super::cross_validation::{CVStrategy, CrossValidator};
use super::metrics::accuracy_score;
use super::registry::Classifier;
use crate::error::{NetsecError, Result};

/// Cross-validated score of one candidate
#[derive(Debug, Clone)]
pub struct CandidateScore {
    pub params: String,
    /// Mean fold accuracy; NaN when any fold failed
    pub mean_score: f64,
}

/// Outcome of a search: the refitted winner and every candidate's score
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    /// Winner refitted on the full training set
    pub best_model: Classifier,
    pub best_index: usize,
    /// `None` when a single candidate was refitted without scoring
    pub best_score: Option<f64>,
    pub scores: Vec<CandidateScore>,
}

/// Grid search over a fixed candidate list
#[derive(Debug, Clone)]
pub struct GridSearch {
    cv: CrossValidator,
}

impl GridSearch {
    /// Stratified, unshuffled k-fold search
    pub fn new(cv_folds: usize) -> Self {
        Self {
            cv: CrossValidator::new(CVStrategy::StratifiedKFold {
                n_splits: cv_folds,
                shuffle: false,
            }),
        }
    }

    pub fn with_cross_validator(mut self, cv: CrossValidator) -> Self {
        self.cv = cv;
        self
    }

    /// Mean held-out accuracy of one candidate over the precomputed folds
    fn score_candidate(
        candidate: &Classifier,
        x: &Array2<f64>,
        y: &Array1<f64>,
        folds: &[(Vec<usize>, Vec<usize>)],
    ) -> Result<f64> {
        let mut total = 0.0;
        for (train_idx, test_idx) in folds {
            let mut model = candidate.clone();
            model.fit(&x.select(Axis(0), train_idx), &y.select(Axis(0), train_idx))?;
            let pred = model.predict(&x.select(Axis(0), test_idx))?;
            total += accuracy_score(&y.select(Axis(0), test_idx), &pred)?;
        }
        Ok(total / folds.len() as f64)
    }

    /// Score every candidate, refit the best on all of `x`/`y`.
    ///
    /// Failed candidates score NaN and are skipped; the first of several
    /// equally scoring candidates wins.
    pub fn fit(&self, candidates: Vec<Classifier>, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult> {
        if candidates.is_empty() {
            return Err(NetsecError::TrainingError("grid search needs at least one candidate".to_string()));
        }

        if candidates.len() == 1 {
            let mut best_model = candidates[0].clone();
            best_model.fit(x, y)?;
            return Ok(GridSearchResult {
                scores: vec![CandidateScore {
                    params: best_model.describe_params(),
                    mean_score: f64::NAN,
                }],
                best_model,
                best_index: 0,
                best_score: None,
            });
        }

        let folds: Vec<(Vec<usize>, Vec<usize>)> = self
            .cv
            .split(y)?
            .into_iter()
            .map(|s| (s.train_indices, s.test_indices))
            .collect();

        let scores: Vec<CandidateScore> = candidates
            .par_iter()
            .map(|candidate| {
                let mean_score = match Self::score_candidate(candidate, x, y, &folds) {
                    Ok(score) => score,
                    Err(e) => {
                        warn!(params = %candidate.describe_params(), error = %e, "Candidate failed");
                        f64::NAN
                    }
                };
                CandidateScore {
                    params: candidate.describe_params(),
                    mean_score,
                }
            })
            .collect();

        let mut best: Option<(usize, f64)> = None;
        for (idx, s) in scores.iter().enumerate() {
            if s.mean_score.is_nan() {
                continue;
            }
            if best.map_or(true, |(_, b)| s.mean_score > b) {
                best = Some((idx, s.mean_score));
            }
        }

        let (best_index, best_score) = best.ok_or_else(|| {
            NetsecError::TrainingError(format!(
                "all {} {} candidates failed",
                candidates.len(),
                candidates[0].family()
            ))
        })?;

        debug!(
            family = %candidates[best_index].family(),
            params = %scores[best_index].params,
            score = best_score,
            "Grid search winner"
        );

        let mut best_model = candidates[best_index].clone();
        best_model.fit(x, y)?;

        Ok(GridSearchResult {
            best_model,
            best_index,
            best_score: Some(best_score),
            scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::registry::{AdaBoostGrid, ModelFamily, ModelMenu};
    use crate::training::DecisionTree;

    /// Classes separated by a wide gap on the first feature
    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((12, 2), |(i, j)| match (i, j) {
            (i, 0) if i >= 6 => (i + 10) as f64,
            (i, 0) => i as f64,
            (i, _) => (i % 3) as f64,
        });
        let y = Array1::from_shape_fn(12, |i| if i >= 6 { 1.0 } else { 0.0 });
        (x, y)
    }

    #[test]
    fn test_search_refits_winner() {
        let (x, y) = data();
        let menu = ModelMenu {
            ada_boost: AdaBoostGrid {
                learning_rate: vec![0.1],
                n_estimators: vec![1, 4],
            },
            ..Default::default()
        };

        let result = GridSearch::new(3).fit(menu.candidates(ModelFamily::AdaBoost), &x, &y).unwrap();
        assert_eq!(result.scores.len(), 2);
        assert_eq!(result.best_score, Some(1.0));
        // Both candidates split the gap in every fold; the first one wins
        assert_eq!(result.best_index, 0);
        assert_eq!(result.best_model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_single_candidate_skips_scoring() {
        let (x, y) = data();
        let candidates = ModelMenu::default().candidates(ModelFamily::LogisticRegression);
        let result = GridSearch::new(3).fit(candidates, &x, &y).unwrap();
        assert!(result.best_score.is_none());
        assert_eq!(result.best_index, 0);
    }

    #[test]
    fn test_failing_candidates_are_skipped() {
        let (x, y) = data();
        // A squared_error classifier tree always fails to fit
        let broken = DecisionTree::new_classifier().with_criterion(crate::training::Criterion::MSE);
        let candidates = vec![
            Classifier::DecisionTree(broken.clone()),
            Classifier::DecisionTree(DecisionTree::new_classifier().with_random_state(42)),
        ];

        let result = GridSearch::new(3).fit(candidates, &x, &y).unwrap();
        assert!(result.scores[0].mean_score.is_nan());
        assert_eq!(result.best_index, 1);

        let all_broken = vec![Classifier::DecisionTree(broken.clone()), Classifier::DecisionTree(broken)];
        assert!(GridSearch::new(3).fit(all_broken, &x, &y).is_err());
    }
}
