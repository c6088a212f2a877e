//! Averaging tree ensembles: random forest, extra trees and bagging.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::data::FeatureMatrix;

use super::classifier::{check_dimensions, check_training_set, Classifier, ModelError, ScoreKind};
use super::params::ParamSet;
use super::tree::{MaxFeatures, Splitter, Tree, TreeParams};

/// How many rows each tree is trained on.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SampleSize {
    Count(usize),
    Fraction(f64),
}

impl SampleSize {
    fn parse(params: &ParamSet) -> Result<Self, ModelError> {
        let Some(value) = params.get("max_samples") else {
            return Ok(Self::Fraction(1.0));
        };
        if value.is_none() {
            return Ok(Self::Fraction(1.0));
        }
        if let Some(count) = value.as_i64() {
            if count >= 1 {
                return Ok(Self::Count(count as usize));
            }
        } else if let Some(f) = value.as_f64() {
            if f > 0.0 && f <= 1.0 {
                return Ok(Self::Fraction(f));
            }
        }
        Err(ModelError::InvalidParameter {
            name: "max_samples".to_string(),
            reason: format!("expected a count >= 1 or a fraction in (0, 1], got {}", value),
        })
    }

    fn resolve(&self, n_rows: usize) -> usize {
        let n = match self {
            Self::Count(c) => *c,
            Self::Fraction(f) => (f * n_rows as f64).round() as usize,
        };
        n.clamp(1, n_rows.max(1))
    }
}

/// Tree ensemble whose score is the mean of the trees' positive shares.
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    n_estimators: usize,
    bootstrap: bool,
    max_samples: SampleSize,
    tree_params: TreeParams,
    seed: u64,
    trees: Vec<Tree>,
}

const FOREST_PARAMS: &[&str] = &[
    "n_estimators",
    "criterion",
    "max_depth",
    "min_samples_split",
    "min_samples_leaf",
    "max_features",
    "bootstrap",
    "max_samples",
    "random_state",
];

const BAGGING_PARAMS: &[&str] = &["n_estimators", "max_samples", "bootstrap", "random_state"];

impl TreeEnsemble {
    pub const RANDOM_FOREST: &'static str = "RandomForestClassifier";
    pub const EXTRA_TREES: &'static str = "ExtraTreesClassifier";
    pub const BAGGING: &'static str = "BaggingClassifier";

    /// Bootstrapped trees with `sqrt` features per split.
    pub fn random_forest(params: &ParamSet) -> Result<Self, ModelError> {
        params.ensure_known(Self::RANDOM_FOREST, FOREST_PARAMS)?;
        let defaults = TreeParams {
            max_features: MaxFeatures::Sqrt,
            ..TreeParams::default()
        };
        Self::build(params, 100, true, defaults)
    }

    /// Random thresholds on the full training set.
    pub fn extra_trees(params: &ParamSet) -> Result<Self, ModelError> {
        params.ensure_known(Self::EXTRA_TREES, FOREST_PARAMS)?;
        let defaults = TreeParams {
            splitter: Splitter::Random,
            max_features: MaxFeatures::Sqrt,
            ..TreeParams::default()
        };
        Self::build(params, 100, false, defaults)
    }

    /// Fully grown trees on bootstrap samples.
    pub fn bagging(params: &ParamSet) -> Result<Self, ModelError> {
        params.ensure_known(Self::BAGGING, BAGGING_PARAMS)?;
        Self::build(params, 10, true, TreeParams::default())
    }

    fn build(
        params: &ParamSet,
        default_estimators: usize,
        default_bootstrap: bool,
        defaults: TreeParams,
    ) -> Result<Self, ModelError> {
        let n_estimators = params.usize_or("n_estimators", default_estimators)?;
        if n_estimators == 0 {
            return Err(ModelError::InvalidParameter {
                name: "n_estimators".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let bootstrap = params.bool_or("bootstrap", default_bootstrap)?;
        let max_samples = SampleSize::parse(params)?;

        Ok(Self {
            n_estimators,
            bootstrap,
            max_samples,
            tree_params: TreeParams::from_params(params, defaults)?,
            seed: params.u64_or("random_state", 0)?,
            trees: Vec::new(),
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn sample(&self, rng: &mut StdRng, n_rows: usize) -> Vec<usize> {
        let n_draw = self.max_samples.resolve(n_rows);
        if self.bootstrap {
            (0..n_draw).map(|_| rng.gen_range(0..n_rows)).collect()
        } else if n_draw < n_rows {
            let mut rows: Vec<usize> = (0..n_rows).collect();
            rows.shuffle(rng);
            rows.truncate(n_draw);
            rows
        } else {
            (0..n_rows).collect()
        }
    }
}

impl Classifier for TreeEnsemble {
    fn fit(&mut self, x: &FeatureMatrix, y: &[u8]) -> Result<(), ModelError> {
        check_training_set(x, y)?;
        let targets: Vec<f64> = y.iter().map(|&label| label as f64).collect();
        let weights = vec![1.0; y.len()];
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut trees = Vec::with_capacity(self.n_estimators);
        for _ in 0..self.n_estimators {
            let indices = self.sample(&mut rng, y.len());
            let tree_seed: u64 = rng.gen();
            trees.push(Tree::fit(
                x,
                &targets,
                &weights,
                &indices,
                &self.tree_params,
                tree_seed,
            ));
        }
        self.trees = trees;
        Ok(())
    }

    fn score(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        let first = self.trees.first().ok_or(ModelError::NotFitted)?;
        check_dimensions(first.n_features(), x)?;
        let n_trees = self.trees.len() as f64;
        Ok(x.rows()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect())
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Probability
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}
