//! CART decision trees.
//!
//! One tree type serves classification (targets in {0, 1}, leaf value is the
//! weighted share of positives) and regression on residuals for gradient
//! boosting (leaf value is the weighted mean target).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::data::FeatureMatrix;

use super::classifier::{check_dimensions, check_training_set, Classifier, ModelError, ScoreKind};
use super::params::ParamSet;

/// Minimum impurity decrease for a split to be kept.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Gini,
    Entropy,
    SquaredError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Splitter {
    /// Best threshold over all candidate values.
    Best,
    /// One uniformly drawn threshold per feature.
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
    Count(usize),
    Fraction(f64),
}

impl MaxFeatures {
    fn parse(params: &ParamSet, default: MaxFeatures) -> Result<Self, ModelError> {
        let Some(value) = params.get("max_features") else {
            return Ok(default);
        };
        if value.is_none() {
            return Ok(Self::All);
        }
        let invalid = |reason: &str| ModelError::InvalidParameter {
            name: "max_features".to_string(),
            reason: format!("{} (got {})", reason, value),
        };
        if let Some(name) = value.as_str() {
            return match name {
                "sqrt" | "auto" => Ok(Self::Sqrt),
                "log2" => Ok(Self::Log2),
                _ => Err(invalid("expected sqrt, log2 or none")),
            };
        }
        if let Some(count) = value.as_i64() {
            return if count >= 1 {
                Ok(Self::Count(count as usize))
            } else {
                Err(invalid("must be at least 1"))
            };
        }
        match value.as_f64() {
            Some(f) if f > 0.0 && f <= 1.0 => Ok(Self::Fraction(f)),
            _ => Err(invalid("expected a fraction in (0, 1]")),
        }
    }

    /// Number of features examined per split.
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            Self::All => n_features,
            Self::Sqrt => n.sqrt() as usize,
            Self::Log2 => n.log2() as usize,
            Self::Count(c) => *c,
            Self::Fraction(f) => (f * n) as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Tree growth settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub criterion: Criterion,
    pub splitter: Splitter,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            criterion: Criterion::Gini,
            splitter: Splitter::Best,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
        }
    }
}

impl TreeParams {
    /// Read the shared tree hyperparameters, falling back to `defaults`.
    /// `criterion` is only read for classification defaults.
    pub fn from_params(params: &ParamSet, defaults: TreeParams) -> Result<Self, ModelError> {
        let criterion = match defaults.criterion {
            Criterion::SquaredError => Criterion::SquaredError,
            _ => match params.str_or("criterion", "gini")? {
                "gini" => Criterion::Gini,
                "entropy" | "log_loss" => Criterion::Entropy,
                other => {
                    return Err(ModelError::InvalidParameter {
                        name: "criterion".to_string(),
                        reason: format!("unknown criterion '{}'", other),
                    })
                }
            },
        };

        let max_depth = match params.get("max_depth") {
            None => defaults.max_depth,
            Some(_) => params.opt_usize("max_depth")?,
        };
        if max_depth == Some(0) {
            return Err(ModelError::InvalidParameter {
                name: "max_depth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let min_samples_split = params.usize_or("min_samples_split", defaults.min_samples_split)?;
        if min_samples_split < 2 {
            return Err(ModelError::InvalidParameter {
                name: "min_samples_split".to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        let min_samples_leaf = params.usize_or("min_samples_leaf", defaults.min_samples_leaf)?;
        if min_samples_leaf < 1 {
            return Err(ModelError::InvalidParameter {
                name: "min_samples_leaf".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            criterion,
            splitter: defaults.splitter,
            max_depth,
            min_samples_split,
            min_samples_leaf,
            max_features: MaxFeatures::parse(params, defaults.max_features)?,
        })
    }
}

/// Weighted sufficient statistics of a node.
#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    weight: f64,
    sum: f64,
    sum_sq: f64,
    count: usize,
}

impl Stats {
    fn add(&mut self, w: f64, y: f64) {
        self.weight += w;
        self.sum += w * y;
        self.sum_sq += w * y * y;
        self.count += 1;
    }

    fn minus(&self, other: &Stats) -> Stats {
        Stats {
            weight: self.weight - other.weight,
            sum: self.sum - other.sum,
            sum_sq: self.sum_sq - other.sum_sq,
            count: self.count - other.count,
        }
    }

    fn mean(&self) -> f64 {
        if self.weight > 0.0 {
            self.sum / self.weight
        } else {
            0.0
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        let p = self.mean();
        match criterion {
            Criterion::Gini => 2.0 * p * (1.0 - p),
            Criterion::Entropy => {
                let h = |q: f64| if q > 0.0 { -q * q.log2() } else { 0.0 };
                h(p) + h(1.0 - p)
            }
            Criterion::SquaredError => (self.sum_sq / self.weight - p * p).max(0.0),
        }
    }

    /// Weighted impurity, the quantity a split minimises.
    fn cost(&self, criterion: Criterion) -> f64 {
        self.weight * self.impurity(criterion)
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// A fitted tree, stored as a flat node arena rooted at index 0.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    n_features: usize,
}

impl Tree {
    /// Grow a tree on the rows listed in `indices` (repeats allowed).
    pub fn fit(
        x: &FeatureMatrix,
        targets: &[f64],
        weights: &[f64],
        indices: &[usize],
        params: &TreeParams,
        seed: u64,
    ) -> Tree {
        let mut builder = Builder {
            x,
            targets,
            weights,
            params,
            rng: StdRng::seed_from_u64(seed),
            nodes: Vec::new(),
            features_per_split: params.max_features.resolve(x.n_cols()),
        };
        let mut indices = indices.to_vec();
        builder.grow(&mut indices, 0);

        Tree {
            nodes: builder.nodes,
            n_features: x.n_cols(),
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Index of the leaf `row` falls into.
    pub fn leaf_of(&self, row: &[f64]) -> usize {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { .. } => return node,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        match &self.nodes[self.leaf_of(row)] {
            Node::Leaf { value } => *value,
            Node::Split { .. } => 0.0,
        }
    }

    /// Indices of all leaves.
    pub fn leaves(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| matches!(node, Node::Leaf { .. }))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Overwrite a leaf's value. No-op on internal nodes.
    pub fn set_leaf_value(&mut self, node: usize, new_value: f64) {
        if let Some(Node::Leaf { value }) = self.nodes.get_mut(node) {
            *value = new_value;
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], node: usize) -> usize {
            match &nodes[node] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

struct Builder<'a> {
    x: &'a FeatureMatrix,
    targets: &'a [f64],
    weights: &'a [f64],
    params: &'a TreeParams,
    rng: StdRng,
    nodes: Vec<Node>,
    features_per_split: usize,
}

impl Builder<'_> {
    fn stats(&self, indices: &[usize]) -> Stats {
        let mut stats = Stats::default();
        for &i in indices {
            stats.add(self.weights[i], self.targets[i]);
        }
        stats
    }

    /// Grow the subtree for `indices`; returns its node index.
    fn grow(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let node = self.nodes.len();
        let stats = self.stats(indices);
        self.nodes.push(Node::Leaf {
            value: stats.mean(),
        });

        let params = self.params;
        let depth_reached = params.max_depth.is_some_and(|max| depth >= max);
        if depth_reached
            || indices.len() < params.min_samples_split
            || indices.len() < 2 * params.min_samples_leaf
            || stats.impurity(params.criterion) <= MIN_GAIN
        {
            return node;
        }

        let Some(split) = self.find_split(indices, &stats) else {
            return node;
        };

        let mid = partition(indices, |i| self.x.get(i, split.feature) <= split.threshold);
        if mid == 0 || mid == indices.len() {
            return node;
        }
        let (left_rows, right_rows) = indices.split_at_mut(mid);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[node] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node
    }

    fn find_split(&mut self, indices: &[usize], parent: &Stats) -> Option<SplitCandidate> {
        let mut features: Vec<usize> = (0..self.x.n_cols()).collect();
        if self.features_per_split < features.len() {
            features.shuffle(&mut self.rng);
        }

        let mut best: Option<SplitCandidate> = None;
        for &feature in features.iter().take(self.features_per_split) {
            let candidate = match self.params.splitter {
                Splitter::Best => self.best_threshold(feature, indices, parent),
                Splitter::Random => self.random_threshold(feature, indices, parent),
            };
            if let Some(c) = candidate {
                if best.map_or(true, |b| c.gain > b.gain) {
                    best = Some(c);
                }
            }
        }
        best.filter(|b| b.gain > MIN_GAIN)
    }

    fn best_threshold(
        &self,
        feature: usize,
        indices: &[usize],
        parent: &Stats,
    ) -> Option<SplitCandidate> {
        let x = self.x;
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| x.get(a, feature).total_cmp(&x.get(b, feature)));

        let criterion = self.params.criterion;
        let min_leaf = self.params.min_samples_leaf;
        let parent_cost = parent.cost(criterion);
        let mut left = Stats::default();
        let mut best: Option<SplitCandidate> = None;

        for pos in 0..order.len().saturating_sub(1) {
            let i = order[pos];
            left.add(self.weights[i], self.targets[i]);
            let here = x.get(i, feature);
            let next = x.get(order[pos + 1], feature);
            if here == next {
                continue;
            }
            let right = parent.minus(&left);
            if left.count < min_leaf || right.count < min_leaf {
                continue;
            }
            let gain = parent_cost - left.cost(criterion) - right.cost(criterion);
            if best.map_or(true, |b| gain > b.gain) {
                let mut threshold = here + (next - here) / 2.0;
                if threshold >= next {
                    threshold = here;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    gain,
                });
            }
        }
        best
    }

    fn random_threshold(
        &mut self,
        feature: usize,
        indices: &[usize],
        parent: &Stats,
    ) -> Option<SplitCandidate> {
        let x = self.x;
        let (lo, hi) = indices
            .iter()
            .map(|&i| x.get(i, feature))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if !(hi > lo) {
            return None;
        }
        let threshold = self.rng.gen_range(lo..hi);

        let mut left = Stats::default();
        for &i in indices {
            if x.get(i, feature) <= threshold {
                left.add(self.weights[i], self.targets[i]);
            }
        }
        let right = parent.minus(&left);
        let min_leaf = self.params.min_samples_leaf;
        if left.count < min_leaf || right.count < min_leaf {
            return None;
        }
        let criterion = self.params.criterion;
        Some(SplitCandidate {
            feature,
            threshold,
            gain: parent.cost(criterion) - left.cost(criterion) - right.cost(criterion),
        })
    }
}

/// Reorder `items` so that those matching `pred` come first; returns their count.
fn partition(items: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for pos in 0..items.len() {
        if pred(items[pos]) {
            items.swap(mid, pos);
            mid += 1;
        }
    }
    mid
}

/// Single CART classification tree.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    params: TreeParams,
    seed: u64,
    tree: Option<Tree>,
}

impl DecisionTree {
    pub const FAMILY: &'static str = "DecisionTreeClassifier";
    const PARAMS: &'static [&'static str] = &[
        "criterion",
        "splitter",
        "max_depth",
        "min_samples_split",
        "min_samples_leaf",
        "max_features",
        "random_state",
    ];

    pub fn from_params(params: &ParamSet) -> Result<Self, ModelError> {
        params.ensure_known(Self::FAMILY, Self::PARAMS)?;
        let splitter = match params.str_or("splitter", "best")? {
            "best" => Splitter::Best,
            "random" => Splitter::Random,
            other => {
                return Err(ModelError::InvalidParameter {
                    name: "splitter".to_string(),
                    reason: format!("unknown splitter '{}'", other),
                })
            }
        };
        let defaults = TreeParams {
            splitter,
            ..TreeParams::default()
        };
        Ok(Self {
            params: TreeParams::from_params(params, defaults)?,
            seed: params.u64_or("random_state", 0)?,
            tree: None,
        })
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &FeatureMatrix, y: &[u8]) -> Result<(), ModelError> {
        check_training_set(x, y)?;
        let targets: Vec<f64> = y.iter().map(|&label| label as f64).collect();
        let weights = vec![1.0; y.len()];
        let indices: Vec<usize> = (0..y.len()).collect();
        self.tree = Some(Tree::fit(x, &targets, &weights, &indices, &self.params, self.seed));
        Ok(())
    }

    fn score(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        let tree = self.tree.as_ref().ok_or(ModelError::NotFitted)?;
        check_dimensions(tree.n_features(), x)?;
        Ok(x.rows().map(|row| tree.predict_row(row)).collect())
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Probability
    }

    fn is_fitted(&self) -> bool {
        self.tree.is_some()
    }
}
