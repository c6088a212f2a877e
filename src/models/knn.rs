//! k-nearest-neighbours classifier.

use crate::data::FeatureMatrix;

use super::classifier::{check_dimensions, check_training_set, Classifier, ModelError, ScoreKind};
use super::params::ParamSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    Uniform,
    Distance,
}

/// Scores are the (weighted) share of positive labels among the neighbours.
#[derive(Debug, Clone)]
pub struct KNeighbors {
    n_neighbors: usize,
    weights: Weighting,
    /// Minkowski exponent.
    p: f64,
    train: Option<(FeatureMatrix, Vec<u8>)>,
}

impl KNeighbors {
    pub const FAMILY: &'static str = "KNeighborsClassifier";
    const PARAMS: &'static [&'static str] = &["n_neighbors", "weights", "p"];

    pub fn from_params(params: &ParamSet) -> Result<Self, ModelError> {
        params.ensure_known(Self::FAMILY, Self::PARAMS)?;

        let n_neighbors = params.usize_or("n_neighbors", 5)?;
        if n_neighbors == 0 {
            return Err(ModelError::InvalidParameter {
                name: "n_neighbors".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let weights = match params.str_or("weights", "uniform")? {
            "uniform" => Weighting::Uniform,
            "distance" => Weighting::Distance,
            other => {
                return Err(ModelError::InvalidParameter {
                    name: "weights".to_string(),
                    reason: format!("unknown weighting '{}'", other),
                })
            }
        };
        let p = params.f64_or("p", 2.0)?;
        if p < 1.0 {
            return Err(ModelError::InvalidParameter {
                name: "p".to_string(),
                reason: format!("must be >= 1, got {}", p),
            });
        }

        Ok(Self {
            n_neighbors,
            weights,
            p,
            train: None,
        })
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        let diffs = a.iter().zip(b).map(|(x, y)| (x - y).abs());
        if self.p == 1.0 {
            diffs.sum()
        } else if self.p == 2.0 {
            diffs.map(|d| d * d).sum::<f64>().sqrt()
        } else {
            diffs.map(|d| d.powf(self.p)).sum::<f64>().powf(1.0 / self.p)
        }
    }
}

impl Classifier for KNeighbors {
    fn fit(&mut self, x: &FeatureMatrix, y: &[u8]) -> Result<(), ModelError> {
        check_training_set(x, y)?;
        self.train = Some((x.clone(), y.to_vec()));
        Ok(())
    }

    fn score(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        let (train_x, train_y) = self.train.as_ref().ok_or(ModelError::NotFitted)?;
        check_dimensions(train_x.n_cols(), x)?;
        let k = self.n_neighbors.min(train_x.n_rows());

        let mut neighbours: Vec<(f64, usize)> = Vec::with_capacity(train_x.n_rows());
        let scores = x
            .rows()
            .map(|row| {
                neighbours.clear();
                neighbours.extend(
                    train_x
                        .rows()
                        .enumerate()
                        .map(|(i, other)| (self.distance(row, other), i)),
                );
                neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));
                let nearest = &neighbours[..k];

                match self.weights {
                    Weighting::Uniform => {
                        nearest.iter().filter(|(_, i)| train_y[*i] == 1).count() as f64 / k as f64
                    }
                    Weighting::Distance => {
                        // Exact matches take all the weight.
                        let exact: Vec<usize> = nearest
                            .iter()
                            .filter(|(d, _)| *d == 0.0)
                            .map(|(_, i)| *i)
                            .collect();
                        if !exact.is_empty() {
                            let pos = exact.iter().filter(|&&i| train_y[i] == 1).count();
                            return pos as f64 / exact.len() as f64;
                        }
                        let (pos, total) = nearest.iter().fold((0.0, 0.0), |(pos, total), (d, i)| {
                            let w = 1.0 / d;
                            (pos + w * train_y[*i] as f64, total + w)
                        });
                        pos / total
                    }
                }
            })
            .collect();

        Ok(scores)
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Probability
    }

    fn is_fitted(&self) -> bool {
        self.train.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line() -> (FeatureMatrix, Vec<u8>) {
        let rows: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let x = FeatureMatrix::from_rows(vec!["a".into()], &rows).unwrap();
        (x, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn test_uniform_vote() {
        let (x, y) = line();
        let mut model = KNeighbors::from_params(&ParamSet::new().with("n_neighbors", 3)).unwrap();
        model.fit(&x, &y).unwrap();

        let query = FeatureMatrix::from_rows(vec!["a".into()], &[vec![0.0], vec![2.6], vec![5.0]]).unwrap();
        let scores = model.score(&query).unwrap();
        assert_relative_eq!(scores[0], 0.0);
        // neighbours 3, 2, 4
        assert_relative_eq!(scores[1], 2.0 / 3.0);
        assert_relative_eq!(scores[2], 1.0);
    }

    #[test]
    fn test_distance_weighting_exact_match() {
        let (x, y) = line();
        let mut model = KNeighbors::from_params(
            &ParamSet::new().with("n_neighbors", 3).with("weights", "distance"),
        )
        .unwrap();
        model.fit(&x, &y).unwrap();
        let scores = model.score(&x).unwrap();
        assert_eq!(scores, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_k_larger_than_train() {
        let (x, y) = line();
        let mut model = KNeighbors::from_params(&ParamSet::new().with("n_neighbors", 50)).unwrap();
        model.fit(&x, &y).unwrap();
        let scores = model.score(&x).unwrap();
        assert!(scores.iter().all(|&p| (p - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_invalid_params() {
        assert!(KNeighbors::from_params(&ParamSet::new().with("n_neighbors", 0)).is_err());
        assert!(KNeighbors::from_params(&ParamSet::new().with("weights", "gaussian")).is_err());
        assert!(KNeighbors::from_params(&ParamSet::new().with("p", 0.5)).is_err());
    }
}
