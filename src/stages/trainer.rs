//! Training: per-family grid search, selection by test r² and bundling

use ndarray::{s, Array1, Array2};
use std::path::Path;
use tracing::info;

use crate::artifact::{ModelTrainerArtifact, TransformationArtifact};
use crate::config::TrainerConfig;
use crate::error::{NetsecError, PipelineError, Result, StageContext};
use crate::imputation::KNNImputer;
use crate::pipeline::PipelineStage;
use crate::training::metrics::{classification_score, r2_score, select_best};
use crate::training::{Classifier, GridSearch, ModelBundle, ModelFamily};
use crate::utils::persist::{load_array, load_object, KIND_IMPUTER};

/// Outcome of tuning one family
#[derive(Debug, Clone)]
pub struct FamilyEvaluation {
    pub family: ModelFamily,
    /// Refitted on the full training split
    pub model: Classifier,
    pub params: String,
    pub cv_score: Option<f64>,
    pub train_score: f64,
    pub test_score: f64,
}

pub struct ModelTrainer<'a> {
    config: &'a TrainerConfig,
}

/// Split a transformed array into features and its last column
pub fn split_last_column(array: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
    let n_cols = array.ncols();
    if n_cols < 2 {
        return Err(NetsecError::ShapeError {
            expected: "at least one feature column and a target column".to_string(),
            actual: format!("{} columns", n_cols),
        });
    }
    Ok((
        array.slice(s![.., ..n_cols - 1]).to_owned(),
        array.column(n_cols - 1).to_owned(),
    ))
}

impl<'a> ModelTrainer<'a> {
    pub fn new(config: &'a TrainerConfig) -> Self {
        Self { config }
    }

    /// Tune every family on the training split and score the refitted
    /// winner of each with r² on both splits.
    pub fn evaluate_models(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<Vec<FamilyEvaluation>> {
        let search = GridSearch::new(self.config.cv_folds);
        let mut report = Vec::with_capacity(ModelFamily::ALL.len());

        for family in ModelFamily::ALL {
            let candidates = self.config.model_menu.candidates(family);
            info!(family = %family, candidates = candidates.len(), "Running grid search");

            let result = search.fit(candidates, x_train, y_train).map_err(|e| {
                NetsecError::TrainingError(format!("grid search for {} failed: {}", family, e))
            })?;
            let model = result.best_model;

            let train_score = r2_score(y_train, &model.predict(x_train)?)?;
            let test_score = r2_score(y_test, &model.predict(x_test)?)?;
            let params = model.describe_params();
            info!(
                family = %family,
                params = %params,
                cv_score = ?result.best_score,
                train_score,
                test_score,
                "Family evaluated"
            );

            report.push(FamilyEvaluation {
                family,
                model,
                params,
                cv_score: result.best_score,
                train_score,
                test_score,
            });
        }

        Ok(report)
    }

    fn train_model(&self, transformation: &TransformationArtifact) -> Result<ModelTrainerArtifact> {
        let (x_train, y_train) = split_last_column(&load_array(&transformation.transformed_train_file_path)?)?;
        let (x_test, y_test) = split_last_column(&load_array(&transformation.transformed_test_file_path)?)?;

        let report = self.evaluate_models(&x_train, &y_train, &x_test, &y_test)?;

        let scores: Vec<(usize, f64)> = report.iter().enumerate().map(|(i, e)| (i, e.test_score)).collect();
        let best_idx = select_best(&scores)
            .ok_or_else(|| NetsecError::TrainingError("no family produced a finite test score".to_string()))?;
        let best = &report[best_idx];
        info!(
            model = %best.family,
            params = %best.params,
            r2 = best.test_score,
            "Best model found"
        );

        let train_metric = classification_score(&y_train, &best.model.predict(&x_train)?)?;
        let test_metric = classification_score(&y_test, &best.model.predict(&x_test)?)?;

        let preprocessor = load_preprocessor(&transformation.transformed_object_file_path)?;
        let bundle = ModelBundle::new(preprocessor, best.model.clone());
        bundle.save(&self.config.trained_model_file_path)?;
        bundle.save(&self.config.final_model_file_path)?;

        Ok(ModelTrainerArtifact {
            trained_model_file_path: self.config.trained_model_file_path.clone(),
            train_metric,
            test_metric,
        })
    }

    pub fn run(&self, transformation: &TransformationArtifact) -> std::result::Result<ModelTrainerArtifact, PipelineError> {
        info!("Starting model training");
        let artifact = self.train_model(transformation).in_stage(PipelineStage::Training)?;
        info!(%artifact, "Model training completed");
        Ok(artifact)
    }
}

fn load_preprocessor(path: &Path) -> Result<KNNImputer> {
    load_object(path, KIND_IMPUTER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_split_last_column() {
        let (x, y) = split_last_column(&array![[1.0, 2.0, 0.0], [3.0, 4.0, 1.0]]).unwrap();
        assert_eq!(x, array![[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(y, array![0.0, 1.0]);
        assert!(split_last_column(&array![[1.0], [2.0]]).is_err());
    }
}
