//! Linear models trained by proximal gradient descent.
//!
//! Both families minimise `C * sum(loss) + R(w)` where `R` is the L2
//! (`0.5 * ||w||^2`) or L1 (`||w||_1`) penalty. The intercept is not
//! penalised. L1 is handled with a soft-thresholding proximal step.

use crate::data::FeatureMatrix;

use super::classifier::{
    check_dimensions, check_training_set, dot, sigmoid, Classifier, ModelError, ScoreKind,
};
use super::params::ParamSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    L1,
    L2,
    None,
}

impl Penalty {
    fn parse(value: &str) -> Result<Self, ModelError> {
        match value.to_ascii_lowercase().as_str() {
            "l1" => Ok(Self::L1),
            "l2" => Ok(Self::L2),
            "none" => Ok(Self::None),
            other => Err(ModelError::InvalidParameter {
                name: "penalty".to_string(),
                reason: format!("unknown penalty '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Loss {
    Logistic,
    SquaredHinge,
}

impl Loss {
    /// Derivative of the loss with respect to the margin.
    fn gradient(&self, label: u8, margin: f64) -> f64 {
        match self {
            Self::Logistic => sigmoid(margin) - label as f64,
            Self::SquaredHinge => {
                let sign = if label == 1 { 1.0 } else { -1.0 };
                let slack = 1.0 - sign * margin;
                if slack > 0.0 {
                    -2.0 * sign * slack
                } else {
                    0.0
                }
            }
        }
    }

    /// Upper bound on the curvature of the loss.
    fn smoothness(&self) -> f64 {
        match self {
            Self::Logistic => 0.25,
            Self::SquaredHinge => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Solver {
    loss: Loss,
    penalty: Penalty,
    c: f64,
    max_iter: usize,
    tol: f64,
}

#[derive(Debug, Clone)]
struct LinearFit {
    weights: Vec<f64>,
    intercept: f64,
}

impl LinearFit {
    fn margin(&self, row: &[f64]) -> f64 {
        dot(&self.weights, row) + self.intercept
    }
}

impl Solver {
    fn from_params(
        params: &ParamSet,
        loss: Loss,
        default_penalty: &str,
    ) -> Result<Self, ModelError> {
        let c = params.f64_or("C", 1.0)?;
        if c <= 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "C".to_string(),
                reason: format!("must be positive, got {}", c),
            });
        }
        let tol = params.f64_or("tol", 1e-4)?;
        if tol <= 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "tol".to_string(),
                reason: format!("must be positive, got {}", tol),
            });
        }
        let penalty = match params.get("penalty") {
            Some(value) if value.is_none() => Penalty::None,
            _ => Penalty::parse(params.str_or("penalty", default_penalty)?)?,
        };

        Ok(Self {
            loss,
            penalty,
            c,
            max_iter: params.usize_or("max_iter", 1000)?.max(1),
            tol,
        })
    }

    fn fit(&self, x: &FeatureMatrix, y: &[u8]) -> LinearFit {
        let n = x.n_rows() as f64;
        let d = x.n_cols();
        // Objective scaled by 1/(C n) so the step size does not depend on n.
        let lambda = match self.penalty {
            Penalty::None => 0.0,
            _ => 1.0 / (self.c * n),
        };

        let max_norm = x
            .rows()
            .map(|row| dot(row, row) + 1.0)
            .fold(0.0_f64, f64::max);
        let mut lipschitz = self.loss.smoothness() * max_norm;
        if self.penalty == Penalty::L2 {
            lipschitz += lambda;
        }
        let step = 1.0 / lipschitz;

        let mut fit = LinearFit {
            weights: vec![0.0; d],
            intercept: 0.0,
        };
        let mut grad_w = vec![0.0; d];

        for _ in 0..self.max_iter {
            grad_w.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_b = 0.0;
            for (row, &label) in x.rows().zip(y) {
                let g = self.loss.gradient(label, fit.margin(row));
                if g != 0.0 {
                    for (acc, v) in grad_w.iter_mut().zip(row) {
                        *acc += g * v;
                    }
                    grad_b += g;
                }
            }

            let mut max_change: f64 = 0.0;
            for (w, g) in fit.weights.iter_mut().zip(&grad_w) {
                let mut gradient = g / n;
                if self.penalty == Penalty::L2 {
                    gradient += lambda * *w;
                }
                let mut updated = *w - step * gradient;
                if self.penalty == Penalty::L1 {
                    updated = soft_threshold(updated, step * lambda);
                }
                max_change = max_change.max((updated - *w).abs());
                *w = updated;
            }
            let updated_b = fit.intercept - step * grad_b / n;
            max_change = max_change.max((updated_b - fit.intercept).abs());
            fit.intercept = updated_b;

            if max_change < self.tol * step {
                break;
            }
        }

        fit
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Linear support vector classifier with squared hinge loss.
#[derive(Debug, Clone)]
pub struct LinearSvc {
    solver: Solver,
    fit: Option<LinearFit>,
}

impl LinearSvc {
    pub const FAMILY: &'static str = "LinearSVC";
    const PARAMS: &'static [&'static str] = &["C", "penalty", "max_iter", "tol"];

    pub fn from_params(params: &ParamSet) -> Result<Self, ModelError> {
        params.ensure_known(Self::FAMILY, Self::PARAMS)?;
        let solver = Solver::from_params(params, Loss::SquaredHinge, "l2")?;
        if solver.penalty == Penalty::None {
            return Err(ModelError::InvalidParameter {
                name: "penalty".to_string(),
                reason: "LinearSVC requires l1 or l2".to_string(),
            });
        }
        Ok(Self { solver, fit: None })
    }

    /// Fitted coefficients, if any.
    pub fn coefficients(&self) -> Option<(&[f64], f64)> {
        self.fit
            .as_ref()
            .map(|fit| (fit.weights.as_slice(), fit.intercept))
    }
}

impl Classifier for LinearSvc {
    fn fit(&mut self, x: &FeatureMatrix, y: &[u8]) -> Result<(), ModelError> {
        check_training_set(x, y)?;
        self.fit = Some(self.solver.fit(x, y));
        Ok(())
    }

    fn score(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        let fit = self.fit.as_ref().ok_or(ModelError::NotFitted)?;
        check_dimensions(fit.weights.len(), x)?;
        Ok(x.rows().map(|row| fit.margin(row)).collect())
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::DecisionFunction
    }

    fn is_fitted(&self) -> bool {
        self.fit.is_some()
    }
}

/// Logistic regression; scores are P(label = 1).
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    solver: Solver,
    fit: Option<LinearFit>,
}

impl LogisticRegression {
    pub const FAMILY: &'static str = "LogisticRegression";
    const PARAMS: &'static [&'static str] = &["C", "penalty", "max_iter", "tol"];

    pub fn from_params(params: &ParamSet) -> Result<Self, ModelError> {
        params.ensure_known(Self::FAMILY, Self::PARAMS)?;
        Ok(Self {
            solver: Solver::from_params(params, Loss::Logistic, "l2")?,
            fit: None,
        })
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &FeatureMatrix, y: &[u8]) -> Result<(), ModelError> {
        check_training_set(x, y)?;
        self.fit = Some(self.solver.fit(x, y));
        Ok(())
    }

    fn score(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        let fit = self.fit.as_ref().ok_or(ModelError::NotFitted)?;
        check_dimensions(fit.weights.len(), x)?;
        Ok(x.rows().map(|row| sigmoid(fit.margin(row))).collect())
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Probability
    }

    fn is_fitted(&self) -> bool {
        self.fit.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (FeatureMatrix, Vec<u8>) {
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let t = i as f64 / 40.0;
                vec![t, 1.0 - t * 0.5]
            })
            .collect();
        let labels = (0..40).map(|i| if i >= 20 { 1 } else { 0 }).collect();
        let x = FeatureMatrix::from_rows(vec!["a".into(), "b".into()], &rows).unwrap();
        (x, labels)
    }

    #[test]
    fn test_svc_separates() {
        let (x, y) = separable();
        let mut model = LinearSvc::from_params(&ParamSet::new().with("C", 10.0)).unwrap();
        model.fit(&x, &y).unwrap();

        let scores = model.score(&x).unwrap();
        let mean_pos: f64 = scores[20..].iter().sum::<f64>() / 20.0;
        let mean_neg: f64 = scores[..20].iter().sum::<f64>() / 20.0;
        assert!(mean_pos > mean_neg);
        assert!(scores[39] > scores[0]);
        assert_eq!(model.score_kind(), ScoreKind::DecisionFunction);
    }

    #[test]
    fn test_logistic_probabilities() {
        let (x, y) = separable();
        let mut model = LogisticRegression::from_params(&ParamSet::new()).unwrap();
        assert!(!model.is_fitted());
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted());

        let scores = model.score(&x).unwrap();
        assert!(scores.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(scores[39] > scores[0]);
    }

    #[test]
    fn test_l1_shrinks_irrelevant_weight() {
        let rows: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![(i % 2) as f64, 0.5])
            .collect();
        let labels: Vec<u8> = (0..30).map(|i| (i % 2) as u8).collect();
        let x = FeatureMatrix::from_rows(vec!["signal".into(), "constant".into()], &rows).unwrap();

        let mut model =
            LinearSvc::from_params(&ParamSet::new().with("C", 0.5).with("penalty", "l1")).unwrap();
        model.fit(&x, &labels).unwrap();
        let (weights, _) = model.coefficients().unwrap();
        assert!(weights[0] > 0.0);
        assert!(weights[1].abs() < weights[0].abs());
    }

    #[test]
    fn test_invalid_params() {
        assert!(LinearSvc::from_params(&ParamSet::new().with("C", 0.0)).is_err());
        assert!(LinearSvc::from_params(&ParamSet::new().with("penalty", "elasticnet")).is_err());
        assert!(LinearSvc::from_params(&ParamSet::new().with("penalty", "none")).is_err());
        assert!(LinearSvc::from_params(&ParamSet::new().with("kernel", "rbf")).is_err());
        assert!(LogisticRegression::from_params(&ParamSet::new().with("penalty", "none")).is_ok());
    }

    #[test]
    fn test_score_before_fit() {
        let (x, _) = separable();
        let model = LogisticRegression::from_params(&ParamSet::new()).unwrap();
        assert!(matches!(model.score(&x), Err(ModelError::NotFitted)));
    }

    #[test]
    fn test_single_class_rejected() {
        let (x, _) = separable();
        let mut model = LinearSvc::from_params(&ParamSet::new()).unwrap();
        assert!(matches!(
            model.fit(&x, &vec![0; 40]),
            Err(ModelError::SingleClass(0))
        ));
    }
}
