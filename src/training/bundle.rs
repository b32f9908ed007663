//! Inference bundle: the fitted imputer followed by the selected classifier

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::registry::{Classifier, ModelFamily};
use crate::error::Result;
use crate::imputation::{Imputer, KNNImputer};
use crate::utils::persist::{load_object, save_object, KIND_BUNDLE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub preprocessor: KNNImputer,
    pub model: Classifier,
}

impl ModelBundle {
    pub fn new(preprocessor: KNNImputer, model: Classifier) -> Self {
        Self { preprocessor, model }
    }

    pub fn family(&self) -> ModelFamily {
        self.model.family()
    }

    /// Impute missing features, then classify
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let imputed = self.preprocessor.transform(x)?;
        self.model.predict(&imputed)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_object(path, KIND_BUNDLE, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_object(path, KIND_BUNDLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::LogisticRegression;
    use ndarray::array;
    use tempfile::tempdir;

    fn fitted_bundle() -> ModelBundle {
        let x = array![[0.0, 0.0], [1.0, 0.0], [4.0, 1.0], [5.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut imputer = KNNImputer::new(2);
        imputer.fit(&x).unwrap();
        let mut model = Classifier::LogisticRegression(LogisticRegression::new());
        model.fit(&x, &y).unwrap();
        ModelBundle::new(imputer, model)
    }

    #[test]
    fn test_predict_imputes_first() {
        let bundle = fitted_bundle();
        // Missing second feature is filled from the nearest rows
        let pred = bundle.predict(&array![[0.5, f64::NAN], [4.5, f64::NAN]]).unwrap();
        assert_eq!(pred, array![0.0, 1.0]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("final_model").join("model.bin");
        let bundle = fitted_bundle();

        bundle.save(&path).unwrap();
        let loaded = ModelBundle::load(&path).unwrap();
        assert_eq!(loaded, bundle);
        assert_eq!(loaded.family(), ModelFamily::LogisticRegression);
    }

    #[test]
    fn test_load_rejects_imputer_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preprocessor.bin");
        save_object(&path, crate::utils::persist::KIND_IMPUTER, &KNNImputer::new(3)).unwrap();
        assert!(ModelBundle::load(&path).is_err());
    }
}
