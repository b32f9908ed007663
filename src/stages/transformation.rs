//! Transformation: KNN imputation of the validated splits

use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use tracing::info;

use crate::artifact::{TransformationArtifact, ValidationArtifact};
use crate::config::TransformationConfig;
use crate::error::{NetsecError, PipelineError, Result, StageContext};
use crate::imputation::{Imputer, KNNImputer};
use crate::pipeline::PipelineStage;
use crate::utils::data_loader::{column_to_vec, frame_to_array, DataLoader};
use crate::utils::persist::{save_array, save_object, KIND_IMPUTER};

pub struct DataTransformation<'a> {
    config: &'a TransformationConfig,
}

/// Map the `-1` label to `0`; every other value passes through.
pub fn remap_target(values: &[f64]) -> Result<Array1<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if v.is_nan() {
                Err(NetsecError::DataError(format!("target is missing in row {}", i)))
            } else if v == -1.0 {
                Ok(0.0)
            } else {
                Ok(v)
            }
        })
        .collect()
}

/// Append `target` as the last column of `features`
pub fn stack_target(features: &Array2<f64>, target: &Array1<f64>) -> Result<Array2<f64>> {
    let column = target.view().insert_axis(Axis(1));
    Ok(ndarray::concatenate(Axis(1), &[features.view(), column])?)
}

impl<'a> DataTransformation<'a> {
    pub fn new(config: &'a TransformationConfig) -> Self {
        Self { config }
    }

    /// Split a frame into the feature matrix and the remapped target
    pub fn split_features_target(&self, df: &DataFrame) -> Result<(Array2<f64>, Array1<f64>)> {
        let target_name = self.config.target_column.as_str();
        let target = df
            .column(target_name)
            .map_err(|_| NetsecError::ColumnNotFound(target_name.to_string()))?;
        let target = remap_target(&column_to_vec(target)?)?;
        let features = frame_to_array(&df.drop(target_name)?)?;
        Ok((features, target))
    }

    pub fn get_data_transformer_object(&self) -> KNNImputer {
        KNNImputer::from_params(&self.config.imputer)
    }

    fn transform(&self, validation: &ValidationArtifact) -> Result<TransformationArtifact> {
        let loader = DataLoader::new();
        let train = loader.load_csv(&validation.valid_train_file_path)?;
        let test = loader.load_csv(&validation.valid_test_file_path)?;

        let (x_train, y_train) = self.split_features_target(&train)?;
        let (x_test, y_test) = self.split_features_target(&test)?;

        let mut imputer = self.get_data_transformer_object();
        let x_train = imputer.fit_transform(&x_train)?;
        let x_test = imputer.transform(&x_test)?;
        info!(
            n_neighbors = imputer.n_neighbors(),
            features = x_train.ncols(),
            "Fitted KNN imputer"
        );

        save_array(&self.config.transformed_train_file_path, &stack_target(&x_train, &y_train)?)?;
        save_array(&self.config.transformed_test_file_path, &stack_target(&x_test, &y_test)?)?;

        save_object(&self.config.transformed_object_file_path, KIND_IMPUTER, &imputer)?;
        save_object(&self.config.final_preprocessor_file_path, KIND_IMPUTER, &imputer)?;

        Ok(TransformationArtifact {
            transformed_object_file_path: self.config.transformed_object_file_path.clone(),
            transformed_train_file_path: self.config.transformed_train_file_path.clone(),
            transformed_test_file_path: self.config.transformed_test_file_path.clone(),
        })
    }

    pub fn run(&self, validation: &ValidationArtifact) -> std::result::Result<TransformationArtifact, PipelineError> {
        info!("Starting data transformation");
        if !validation.validation_status {
            info!("Validation reported errors; transforming the valid split paths regardless");
        }
        let artifact = self.transform(validation).in_stage(PipelineStage::Transformation)?;
        info!(%artifact, "Data transformation completed");
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_remap_target() {
        let y = remap_target(&[-1.0, 1.0, 0.0, -1.0, 2.0]).unwrap();
        assert_eq!(y, array![0.0, 1.0, 0.0, 0.0, 2.0]);
        assert!(remap_target(&[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_stack_target() {
        let stacked = stack_target(&array![[1.0, 2.0], [3.0, 4.0]], &array![0.0, 1.0]).unwrap();
        assert_eq!(stacked, array![[1.0, 2.0, 0.0], [3.0, 4.0, 1.0]]);
    }
}
