//! Scoring functions used for model selection and reporting

use crate::artifact::ClassificationMetricArtifact;
use crate::error::{NetsecError, Result};
use ndarray::Array1;

/// Label treated as the positive class
pub const POSITIVE_LABEL: f64 = 1.0;

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(NetsecError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(NetsecError::TrainingError("cannot score an empty prediction".to_string()));
    }
    Ok(())
}

/// Coefficient of determination.
///
/// A constant `y_true` scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;

    let mean = y_true.sum() / y_true.len() as f64;
    let ss_res: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Fraction of exact label matches
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Binary F1, precision and recall for [`POSITIVE_LABEL`]; undefined ratios
/// are reported as 0.
pub fn classification_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<ClassificationMetricArtifact> {
    check_lengths(y_true, y_pred)?;

    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        match (t == POSITIVE_LABEL, p == POSITIVE_LABEL) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

    Ok(ClassificationMetricArtifact {
        f1_score: ratio(2 * tp, 2 * tp + fp + fn_),
        precision_score: ratio(tp, tp + fp),
        recall_score: ratio(tp, tp + fn_),
    })
}

/// Key of the highest score; NaN scores are skipped and the first of equal
/// maxima wins.
pub fn select_best<K: Clone>(report: &[(K, f64)]) -> Option<K> {
    let mut best: Option<(&K, f64)> = None;
    for (key, score) in report {
        if score.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| *score > b) {
            best = Some((key, *score));
        }
    }
    best.map(|(k, _)| k.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_r2_score() {
        let y = array![1.0, 0.0, 1.0, 0.0];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);
        // Always predicting the mean scores zero
        assert!((r2_score(&y, &array![0.5, 0.5, 0.5, 0.5]).unwrap()).abs() < 1e-12);
        // Inverted labels: ss_res = 4, ss_tot = 1
        assert!((r2_score(&y, &array![0.0, 1.0, 0.0, 1.0]).unwrap() + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![1.0, 1.0];
        assert_eq!(r2_score(&y, &array![1.0, 1.0]).unwrap(), 1.0);
        assert_eq!(r2_score(&y, &array![1.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_classification_score() {
        let y_true = array![1.0, 1.0, 0.0, 0.0, 1.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 1.0];
        let m = classification_score(&y_true, &y_pred).unwrap();

        assert!((m.precision_score - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall_score - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1_score - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_is_zero() {
        let y_true = array![0.0, 0.0];
        let y_pred = array![0.0, 0.0];
        let m = classification_score(&y_true, &y_pred).unwrap();
        assert_eq!(m.f1_score, 0.0);
        assert_eq!(m.precision_score, 0.0);
        assert_eq!(m.recall_score, 0.0);
    }

    #[test]
    fn test_select_best() {
        let report = [("A", 0.8), ("B", 0.95), ("C", 0.6)];
        assert_eq!(select_best(&report), Some("B"));

        let tied = [("A", 0.9), ("B", f64::NAN), ("C", 0.9)];
        assert_eq!(select_best(&tied), Some("A"));

        let empty: [(&str, f64); 0] = [];
        assert_eq!(select_best(&empty), None);
    }

    #[test]
    fn test_accuracy_and_length_mismatch() {
        assert_eq!(accuracy_score(&array![1.0, 0.0], &array![1.0, 1.0]).unwrap(), 0.5);
        assert!(accuracy_score(&array![1.0], &array![1.0, 0.0]).is_err());
    }
}
