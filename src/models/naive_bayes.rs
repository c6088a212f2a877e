//! Gaussian naive Bayes.

use statrs::distribution::{Continuous, Normal};

use crate::data::FeatureMatrix;

use super::classifier::{check_dimensions, check_training_set, sigmoid, Classifier, ModelError, ScoreKind};

/// Portion of the largest feature variance added to every variance.
const VAR_SMOOTHING: f64 = 1e-9;

#[derive(Debug, Clone)]
struct ClassModel {
    log_prior: f64,
    features: Vec<Normal>,
}

impl ClassModel {
    fn log_likelihood(&self, row: &[f64]) -> f64 {
        self.log_prior
            + self
                .features
                .iter()
                .zip(row)
                .map(|(dist, &v)| dist.ln_pdf(v))
                .sum::<f64>()
    }
}

/// Gaussian naive Bayes. Takes no hyperparameters.
#[derive(Debug, Clone, Default)]
pub struct GaussianNb {
    classes: Option<[ClassModel; 2]>,
}

impl GaussianNb {
    pub const FAMILY: &'static str = "GaussianNB";

    pub fn new() -> Self {
        Self::default()
    }
}

fn mean_and_variance(x: &FeatureMatrix, rows: &[usize], j: usize) -> (f64, f64) {
    let n = rows.len() as f64;
    let mean = rows.iter().map(|&i| x.get(i, j)).sum::<f64>() / n;
    let var = rows.iter().map(|&i| (x.get(i, j) - mean).powi(2)).sum::<f64>() / n;
    (mean, var)
}

impl Classifier for GaussianNb {
    fn fit(&mut self, x: &FeatureMatrix, y: &[u8]) -> Result<(), ModelError> {
        check_training_set(x, y)?;

        let all: Vec<usize> = (0..x.n_rows()).collect();
        let max_var = (0..x.n_cols())
            .map(|j| mean_and_variance(x, &all, j).1)
            .fold(0.0_f64, f64::max);
        let epsilon = (VAR_SMOOTHING * max_var).max(f64::MIN_POSITIVE);

        let build = |class: u8| -> Result<ClassModel, ModelError> {
            let rows: Vec<usize> = (0..x.n_rows()).filter(|&i| y[i] == class).collect();
            let features = (0..x.n_cols())
                .map(|j| {
                    let (mean, var) = mean_and_variance(x, &rows, j);
                    Normal::new(mean, (var + epsilon).sqrt())
                        .map_err(|e| ModelError::FitFailed(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ClassModel {
                log_prior: (rows.len() as f64 / x.n_rows() as f64).ln(),
                features,
            })
        };

        self.classes = Some([build(0)?, build(1)?]);
        Ok(())
    }

    fn score(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        let [negative, positive] = self.classes.as_ref().ok_or(ModelError::NotFitted)?;
        check_dimensions(negative.features.len(), x)?;

        Ok(x.rows()
            .map(|row| {
                let diff = positive.log_likelihood(row) - negative.log_likelihood(row);
                if diff.is_nan() {
                    0.5
                } else {
                    sigmoid(diff)
                }
            })
            .collect())
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Probability
    }

    fn is_fitted(&self) -> bool {
        self.classes.is_some()
    }
}
