//! Name -> constructor lookup for model families.

use std::collections::HashMap;

use tracing::warn;

use crate::config::ConfigError;

use super::boosting::{AdaBoost, GradientBoosting};
use super::classifier::{Classifier, ModelError};
use super::forest::TreeEnsemble;
use super::knn::KNeighbors;
use super::linear::{LinearSvc, LogisticRegression};
use super::naive_bayes::GaussianNb;
use super::params::ParamSet;
use super::tree::DecisionTree;

/// Builds an unfitted classifier from a parameter set.
pub type Constructor =
    Box<dyn Fn(&ParamSet) -> Result<Box<dyn Classifier>, ModelError> + Send + Sync>;

struct RegistryEntry {
    /// Fixed families ignore configured hyperparameters.
    fixed: bool,
    build: Constructor,
}

/// Registry of model families available to the factory.
pub struct ModelRegistry {
    entries: HashMap<String, RegistryEntry>,
}

fn boxed<C: Classifier + 'static>(
    model: Result<C, ModelError>,
) -> Result<Box<dyn Classifier>, ModelError> {
    model.map(|m| Box::new(m) as Box<dyn Classifier>)
}

impl ModelRegistry {
    /// A registry with no families.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// All built-in classifier families.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(LinearSvc::FAMILY, |p| boxed(LinearSvc::from_params(p)));
        registry.register(LogisticRegression::FAMILY, |p| {
            boxed(LogisticRegression::from_params(p))
        });
        registry.register_fixed(GaussianNb::FAMILY, || Box::new(GaussianNb::new()));
        registry.register(KNeighbors::FAMILY, |p| boxed(KNeighbors::from_params(p)));
        registry.register(DecisionTree::FAMILY, |p| boxed(DecisionTree::from_params(p)));
        registry.register(TreeEnsemble::RANDOM_FOREST, |p| {
            boxed(TreeEnsemble::random_forest(p))
        });
        registry.register(TreeEnsemble::EXTRA_TREES, |p| {
            boxed(TreeEnsemble::extra_trees(p))
        });
        registry.register(TreeEnsemble::BAGGING, |p| boxed(TreeEnsemble::bagging(p)));
        registry.register(AdaBoost::FAMILY, |p| boxed(AdaBoost::from_params(p)));
        registry.register(GradientBoosting::FAMILY, |p| {
            boxed(GradientBoosting::from_params(p))
        });
        registry
    }

    /// Register a family whose constructor takes hyperparameters.
    pub fn register<F>(&mut self, family: &str, build: F)
    where
        F: Fn(&ParamSet) -> Result<Box<dyn Classifier>, ModelError> + Send + Sync + 'static,
    {
        self.entries.insert(
            family.to_string(),
            RegistryEntry {
                fixed: false,
                build: Box::new(build),
            },
        );
    }

    /// Register a family that always yields one default instance.
    pub fn register_fixed<F>(&mut self, family: &str, build: F)
    where
        F: Fn() -> Box<dyn Classifier> + Send + Sync + 'static,
    {
        self.entries.insert(
            family.to_string(),
            RegistryEntry {
                fixed: true,
                build: Box::new(move |_| Ok(build())),
            },
        );
    }

    pub fn contains(&self, family: &str) -> bool {
        self.entries.contains_key(family)
    }

    /// `None` for unknown families.
    pub fn is_fixed(&self, family: &str) -> Option<bool> {
        self.entries.get(family).map(|entry| entry.fixed)
    }

    /// Registered family names, sorted.
    pub fn families(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Construct an unfitted classifier.
    pub fn build(&self, family: &str, params: &ParamSet) -> Result<Box<dyn Classifier>, ConfigError> {
        let entry = self
            .entries
            .get(family)
            .ok_or_else(|| ConfigError::UnknownFamily(family.to_string()))?;
        if entry.fixed && !params.is_empty() {
            warn!("{} takes no hyperparameters; ignoring {}", family, params.signature(family));
        }
        (entry.build)(params).map_err(|e| ConfigError::InvalidGrid {
            family: family.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
