//! Boosted tree ensembles.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::data::FeatureMatrix;

use super::classifier::{
    check_dimensions, check_training_set, sigmoid, Classifier, ModelError, ScoreKind,
};
use super::params::ParamSet;
use super::tree::{Criterion, MaxFeatures, Splitter, Tree, TreeParams};

fn positive_param(params: &ParamSet, name: &str, default: f64) -> Result<f64, ModelError> {
    let value = params.f64_or(name, default)?;
    if value <= 0.0 {
        return Err(ModelError::InvalidParameter {
            name: name.to_string(),
            reason: format!("must be positive, got {}", value),
        });
    }
    Ok(value)
}

fn estimators_param(params: &ParamSet, default: usize) -> Result<usize, ModelError> {
    let n = params.usize_or("n_estimators", default)?;
    if n == 0 {
        return Err(ModelError::InvalidParameter {
            name: "n_estimators".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(n)
}

/// Discrete AdaBoost (SAMME) over decision stumps.
#[derive(Debug, Clone)]
pub struct AdaBoost {
    n_estimators: usize,
    learning_rate: f64,
    /// Fitted stumps with their vote weights.
    stumps: Vec<(Tree, f64)>,
}

impl AdaBoost {
    pub const FAMILY: &'static str = "AdaBoostClassifier";
    const PARAMS: &'static [&'static str] = &["n_estimators", "learning_rate", "random_state"];

    pub fn from_params(params: &ParamSet) -> Result<Self, ModelError> {
        params.ensure_known(Self::FAMILY, Self::PARAMS)?;
        // random_state is accepted; stump fitting is deterministic
        params.u64_or("random_state", 0)?;
        Ok(Self {
            n_estimators: estimators_param(params, 50)?,
            learning_rate: positive_param(params, "learning_rate", 1.0)?,
            stumps: Vec::new(),
        })
    }

    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }

    /// Weighted vote in [-1, 1].
    fn decision(&self, row: &[f64]) -> f64 {
        let total: f64 = self.stumps.iter().map(|(_, alpha)| alpha).sum();
        if total <= 0.0 {
            return 0.0;
        }
        self.stumps
            .iter()
            .map(|(stump, alpha)| {
                if stump.predict_row(row) > 0.5 {
                    *alpha
                } else {
                    -*alpha
                }
            })
            .sum::<f64>()
            / total
    }
}

impl Classifier for AdaBoost {
    fn fit(&mut self, x: &FeatureMatrix, y: &[u8]) -> Result<(), ModelError> {
        check_training_set(x, y)?;
        let n = y.len();
        let targets: Vec<f64> = y.iter().map(|&label| label as f64).collect();
        let indices: Vec<usize> = (0..n).collect();
        let mut weights = vec![1.0 / n as f64; n];
        let stump_params = TreeParams {
            max_depth: Some(1),
            ..TreeParams::default()
        };

        let mut stumps = Vec::with_capacity(self.n_estimators);
        for round in 0..self.n_estimators {
            let stump = Tree::fit(x, &targets, &weights, &indices, &stump_params, round as u64);
            let wrong: Vec<bool> = x
                .rows()
                .zip(y)
                .map(|(row, &label)| (stump.predict_row(row) > 0.5) != (label == 1))
                .collect();

            let total: f64 = weights.iter().sum();
            let error: f64 = weights
                .iter()
                .zip(&wrong)
                .filter(|(_, miss)| **miss)
                .map(|(weight, _)| weight)
                .sum::<f64>()
                / total;

            if error <= 0.0 {
                stumps.push((stump, 1.0));
                break;
            }
            if error >= 0.5 {
                if stumps.is_empty() {
                    return Err(ModelError::FitFailed(
                        "first stump is no better than chance".to_string(),
                    ));
                }
                break;
            }

            let alpha = self.learning_rate * ((1.0 - error) / error).ln();
            for (weight, &miss) in weights.iter_mut().zip(&wrong) {
                if miss {
                    *weight *= alpha.exp();
                }
            }
            let total: f64 = weights.iter().sum();
            weights.iter_mut().for_each(|w| *w /= total);
            stumps.push((stump, alpha));
        }

        self.stumps = stumps;
        Ok(())
    }

    fn score(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        let (first, _) = self.stumps.first().ok_or(ModelError::NotFitted)?;
        check_dimensions(first.n_features(), x)?;
        Ok(x.rows().map(|row| sigmoid(self.decision(row))).collect())
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Probability
    }

    fn is_fitted(&self) -> bool {
        !self.stumps.is_empty()
    }
}

/// Gradient boosting with log-loss and Newton leaf values.
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    n_estimators: usize,
    learning_rate: f64,
    subsample: f64,
    tree_params: TreeParams,
    seed: u64,
    /// Log-odds of the training prior.
    init: f64,
    trees: Vec<Tree>,
}

impl GradientBoosting {
    pub const FAMILY: &'static str = "GradientBoostingClassifier";
    const PARAMS: &'static [&'static str] = &[
        "n_estimators",
        "learning_rate",
        "max_depth",
        "min_samples_split",
        "min_samples_leaf",
        "max_features",
        "subsample",
        "random_state",
    ];

    pub fn from_params(params: &ParamSet) -> Result<Self, ModelError> {
        params.ensure_known(Self::FAMILY, Self::PARAMS)?;
        let subsample = positive_param(params, "subsample", 1.0)?;
        if subsample > 1.0 {
            return Err(ModelError::InvalidParameter {
                name: "subsample".to_string(),
                reason: format!("must be in (0, 1], got {}", subsample),
            });
        }
        let defaults = TreeParams {
            criterion: Criterion::SquaredError,
            splitter: Splitter::Best,
            max_depth: Some(3),
            max_features: MaxFeatures::All,
            ..TreeParams::default()
        };

        Ok(Self {
            n_estimators: estimators_param(params, 100)?,
            learning_rate: positive_param(params, "learning_rate", 0.1)?,
            subsample,
            tree_params: TreeParams::from_params(params, defaults)?,
            seed: params.u64_or("random_state", 0)?,
            init: 0.0,
            trees: Vec::new(),
        })
    }

    fn raw(&self, row: &[f64]) -> f64 {
        self.init
            + self.learning_rate * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }
}

impl Classifier for GradientBoosting {
    fn fit(&mut self, x: &FeatureMatrix, y: &[u8]) -> Result<(), ModelError> {
        check_training_set(x, y)?;
        let n = y.len();
        let prior = (y.iter().filter(|&&label| label == 1).count() as f64 / n as f64)
            .clamp(1e-15, 1.0 - 1e-15);
        self.init = (prior / (1.0 - prior)).ln();
        self.trees.clear();

        let mut raw = vec![self.init; n];
        let ones = vec![1.0; n];
        let n_sample = ((self.subsample * n as f64).round() as usize).clamp(1, n);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut rows: Vec<usize> = (0..n).collect();

        for _ in 0..self.n_estimators {
            let probs: Vec<f64> = raw.iter().map(|&r| sigmoid(r)).collect();
            let residuals: Vec<f64> = y
                .iter()
                .zip(&probs)
                .map(|(&label, p)| label as f64 - p)
                .collect();

            if n_sample < n {
                rows.shuffle(&mut rng);
            }
            let sample = &rows[..n_sample];
            let mut tree = Tree::fit(x, &residuals, &ones, sample, &self.tree_params, rng.gen());

            // One Newton step per leaf.
            let mut numerator = vec![0.0; tree.node_count()];
            let mut denominator = vec![0.0; tree.node_count()];
            for &i in sample {
                let leaf = tree.leaf_of(x.row(i));
                numerator[leaf] += residuals[i];
                denominator[leaf] += probs[i] * (1.0 - probs[i]);
            }
            for leaf in tree.leaves() {
                let value = if denominator[leaf] < 1e-150 {
                    0.0
                } else {
                    numerator[leaf] / denominator[leaf]
                };
                tree.set_leaf_value(leaf, value);
            }

            for (i, r) in raw.iter_mut().enumerate() {
                *r += self.learning_rate * tree.predict_row(x.row(i));
            }
            self.trees.push(tree);
        }

        Ok(())
    }

    fn score(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        let first = self.trees.first().ok_or(ModelError::NotFitted)?;
        check_dimensions(first.n_features(), x)?;
        Ok(x.rows().map(|row| sigmoid(self.raw(row))).collect())
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Probability
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (FeatureMatrix, Vec<u8>) {
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![(i % 10) as f64, (i / 10) as f64])
            .collect();
        // positive when the first feature is large, with a few flips
        let labels = (0..40)
            .map(|i| {
                let base = (i % 10) >= 5;
                u8::from(if i % 13 == 0 { !base } else { base })
            })
            .collect();
        let x = FeatureMatrix::from_rows(vec!["a".into(), "b".into()], &rows).unwrap();
        (x, labels)
    }

    fn auc_like(scores: &[f64], labels: &[u8]) -> f64 {
        let mut wins = 0.0;
        let mut pairs = 0.0;
        for (i, &li) in labels.iter().enumerate() {
            for (j, &lj) in labels.iter().enumerate() {
                if li == 1 && lj == 0 {
                    pairs += 1.0;
                    if scores[i] > scores[j] {
                        wins += 1.0;
                    } else if scores[i] == scores[j] {
                        wins += 0.5;
                    }
                }
            }
        }
        wins / pairs
    }

    #[test]
    fn test_adaboost() {
        let (x, y) = data();
        let mut model = AdaBoost::from_params(&ParamSet::new().with("n_estimators", 10)).unwrap();
        model.fit(&x, &y).unwrap();
        assert!(model.n_stumps() >= 1);
        let scores = model.score(&x).unwrap();
        assert!(scores.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(auc_like(&scores, &y) > 0.8);
    }

    #[test]
    fn test_adaboost_perfect_stump_stops() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let x = FeatureMatrix::from_rows(vec!["a".into()], &rows).unwrap();
        let y: Vec<u8> = (0..10).map(|i| u8::from(i >= 5)).collect();
        let mut model = AdaBoost::from_params(&ParamSet::new()).unwrap();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_stumps(), 1);
        let scores = model.score(&x).unwrap();
        assert!(scores[9] > 0.5 && scores[0] < 0.5);
    }

    #[test]
    fn test_gradient_boosting() {
        let (x, y) = data();
        let mut model = GradientBoosting::from_params(
            &ParamSet::new().with("n_estimators", 30).with("max_depth", 2),
        )
        .unwrap();
        model.fit(&x, &y).unwrap();
        let scores = model.score(&x).unwrap();
        assert!(scores.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(auc_like(&scores, &y) > 0.85);
    }

    #[test]
    fn test_gradient_boosting_subsample_reproducible() {
        let (x, y) = data();
        let params = ParamSet::new()
            .with("n_estimators", 10)
            .with("subsample", 0.5)
            .with("random_state", 11);
        let mut a = GradientBoosting::from_params(&params).unwrap();
        let mut b = GradientBoosting::from_params(&params).unwrap();
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.score(&x).unwrap(), b.score(&x).unwrap());
    }

    #[test]
    fn test_invalid_params() {
        assert!(GradientBoosting::from_params(&ParamSet::new().with("subsample", 1.5)).is_err());
        assert!(GradientBoosting::from_params(&ParamSet::new().with("learning_rate", 0.0)).is_err());
        assert!(GradientBoosting::from_params(&ParamSet::new().with("criterion", "gini")).is_err());
        assert!(AdaBoost::from_params(&ParamSet::new().with("n_estimators", 0)).is_err());
    }
}
