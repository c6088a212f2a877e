//! The binary classifier contract shared by every model family.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::FeatureMatrix;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid value for {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("{family} has no hyperparameter named {name}")]
    UnknownParameter { family: String, name: String },

    #[error("Model has not been fitted")]
    NotFitted,

    #[error("Training labels contain only class {0}")]
    SingleClass(u8),

    #[error("Expected {expected} features, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Label vector has {labels} entries for {rows} rows")]
    LabelMismatch { rows: usize, labels: usize },

    #[error("Fit failed: {0}")]
    FitFailed(String),
}

/// What a classifier's scores mean. Either way, higher means more likely
/// positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreKind {
    /// Signed distance to the separating hyperplane.
    DecisionFunction,
    /// Estimated P(label = 1).
    Probability,
}

/// A binary classifier.
pub trait Classifier: Send {
    /// Train on `x` with labels in {0, 1}.
    fn fit(&mut self, x: &FeatureMatrix, y: &[u8]) -> Result<(), ModelError>;

    /// One real-valued score per row of `x`.
    fn score(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError>;

    fn score_kind(&self) -> ScoreKind;

    fn is_fitted(&self) -> bool;
}

/// Check a training set: non-empty, aligned, both classes present.
pub(crate) fn check_training_set(x: &FeatureMatrix, y: &[u8]) -> Result<(), ModelError> {
    if x.n_rows() == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    if x.n_rows() != y.len() {
        return Err(ModelError::LabelMismatch {
            rows: x.n_rows(),
            labels: y.len(),
        });
    }
    let positives = y.iter().filter(|&&label| label == 1).count();
    if positives == 0 {
        return Err(ModelError::SingleClass(0));
    }
    if positives == y.len() {
        return Err(ModelError::SingleClass(1));
    }
    Ok(())
}

pub(crate) fn check_dimensions(expected: usize, x: &FeatureMatrix) -> Result<(), ModelError> {
    if x.n_cols() != expected {
        return Err(ModelError::DimensionMismatch {
            expected,
            got: x.n_cols(),
        });
    }
    Ok(())
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_check_training_set() {
        let x = FeatureMatrix::from_rows(vec!["a".into()], &[vec![1.0], vec![2.0]]).unwrap();
        assert!(check_training_set(&x, &[0, 1]).is_ok());
        assert!(matches!(
            check_training_set(&x, &[1, 1]),
            Err(ModelError::SingleClass(1))
        ));
        assert!(matches!(
            check_training_set(&x, &[1]),
            Err(ModelError::LabelMismatch { .. })
        ));
    }

    #[test]
    fn test_sigmoid_stable() {
        assert_relative_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-800.0) >= 0.0);
        assert_relative_eq!(sigmoid(800.0), 1.0);
        assert_relative_eq!(sigmoid(2.0) + sigmoid(-2.0), 1.0, epsilon = 1e-12);
    }
}
