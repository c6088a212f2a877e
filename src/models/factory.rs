//! Lazy expansion of a model grid into concrete classifier instances.

use std::fmt;

use tracing::{debug, warn};

use crate::config::ConfigError;

use super::classifier::Classifier;
use super::grid::{Combinations, FamilyGrid, ModelConfig};
use super::params::ParamSet;
use super::registry::ModelRegistry;

/// One unfitted classifier with the hyperparameters it was built from.
pub struct ModelInstance {
    pub family: String,
    pub params: ParamSet,
    pub classifier: Box<dyn Classifier>,
}

impl ModelInstance {
    /// Human-readable `Family(name=value, ...)` string.
    pub fn signature(&self) -> String {
        self.params.signature(&self.family)
    }
}

impl fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstance")
            .field("family", &self.family)
            .field("params", &self.params)
            .field("fitted", &self.classifier.is_fitted())
            .finish()
    }
}

/// Turns a [`ModelConfig`] into classifier instances through a registry.
pub struct ModelFactory {
    registry: ModelRegistry,
}

impl ModelFactory {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn with_defaults() -> Self {
        Self::new(ModelRegistry::with_defaults())
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Resolve every family, then lazily yield one instance per grid point.
    ///
    /// Families come out in declaration order and, within a family, the last
    /// hyperparameter varies fastest. An unknown family fails here before
    /// anything is yielded.
    pub fn expand<'a>(&'a self, config: &'a ModelConfig) -> Result<ModelIter<'a>, ConfigError> {
        for grid in &config.families {
            if !self.registry.contains(&grid.family) {
                return Err(ConfigError::UnknownFamily(grid.family.clone()));
            }
        }
        debug!(
            "Expanding {} model families ({} grid points)",
            config.families.len(),
            config.total_combinations()
        );
        Ok(ModelIter {
            registry: &self.registry,
            families: config.families.iter(),
            current: None,
        })
    }

    /// Build every instance once, returning how many there are.
    pub fn validate(&self, config: &ModelConfig) -> Result<usize, ConfigError> {
        let mut count = 0;
        for instance in self.expand(config)? {
            instance?;
            count += 1;
        }
        Ok(count)
    }

    /// Signatures of every instance, in yield order.
    pub fn signatures(&self, config: &ModelConfig) -> Result<Vec<String>, ConfigError> {
        self.expand(config)?
            .map(|instance| instance.map(|m| m.signature()))
            .collect()
    }
}

impl Default for ModelFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Iterator returned by [`ModelFactory::expand`].
pub struct ModelIter<'a> {
    registry: &'a ModelRegistry,
    families: std::slice::Iter<'a, FamilyGrid>,
    current: Option<(&'a FamilyGrid, Combinations<'a>)>,
}

impl Iterator for ModelIter<'_> {
    type Item = Result<ModelInstance, ConfigError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((grid, combinations)) = &mut self.current {
                if let Some(params) = combinations.next() {
                    let family = grid.family.clone();
                    return Some(self.registry.build(&family, &params).map(|classifier| {
                        ModelInstance {
                            family,
                            params,
                            classifier,
                        }
                    }));
                }
            }

            let grid = self.families.next()?;
            let combinations = if self.registry.is_fixed(&grid.family) == Some(true) {
                if !grid.params.is_empty() {
                    warn!("{} takes no hyperparameters; grid ignored", grid.family);
                }
                Combinations::new(&[])
            } else {
                grid.combinations()
            };
            self.current = Some((grid, combinations));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParamValue;

    fn config(text: &str) -> ModelConfig {
        ModelConfig::from_table(&text.parse::<toml::Table>().unwrap()).unwrap()
    }

    #[test]
    fn test_expand_order() {
        let factory = ModelFactory::with_defaults();
        let models = config(
            r#"
[LinearSVC]
C = [0.1, 1.0]
penalty = ["l2"]

[GaussianNB]
"#,
        );
        let signatures = factory.signatures(&models).unwrap();
        assert_eq!(
            signatures,
            vec![
                "LinearSVC(C=0.1, penalty='l2')",
                "LinearSVC(C=1.0, penalty='l2')",
                "GaussianNB()",
            ]
        );
        assert_eq!(factory.validate(&models).unwrap(), 3);
    }

    #[test]
    fn test_integer_grid_value() {
        let factory = ModelFactory::with_defaults();
        let models = config(
            r#"
[LinearSVC]
C = [0.1, 1]
penalty = ["l2"]
"#,
        );
        let instances: Vec<ModelInstance> =
            factory.expand(&models).unwrap().map(|m| m.unwrap()).collect();
        let signatures: Vec<String> = instances.iter().map(|m| m.signature()).collect();
        assert_eq!(
            signatures,
            vec!["LinearSVC(C=0.1, penalty='l2')", "LinearSVC(C=1, penalty='l2')"]
        );
        assert_eq!(instances[1].family, "LinearSVC");
        assert!(!instances[1].classifier.is_fitted());
    }

    #[test]
    fn test_fixed_family_ignores_grid() {
        let factory = ModelFactory::with_defaults();
        let models = ModelConfig::new().with_family(
            FamilyGrid::new("GaussianNB")
                .with_param("var_smoothing", vec![ParamValue::from(1e-9), ParamValue::from(1e-8)]),
        );
        let instances: Vec<ModelInstance> =
            factory.expand(&models).unwrap().map(|m| m.unwrap()).collect();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].signature(), "GaussianNB()");
        assert!(!instances[0].classifier.is_fitted());
    }

    #[test]
    fn test_unknown_family_fails_before_yield() {
        let factory = ModelFactory::with_defaults();
        let models = config(
            r#"
[LinearSVC]
C = [0.1]

[SVC]
kernel = ["rbf"]
"#,
        );
        assert!(matches!(
            factory.expand(&models),
            Err(ConfigError::UnknownFamily(name)) if name == "SVC"
        ));
    }

    #[test]
    fn test_invalid_value_surfaces_per_instance() {
        let factory = ModelFactory::with_defaults();
        let models = config("[KNeighborsClassifier]\nn_neighbors = [3, 0]\n");
        let results: Vec<_> = factory.expand(&models).unwrap().collect();
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ConfigError::InvalidGrid { .. })));
        assert!(factory.validate(&models).is_err());
    }

    #[test]
    fn test_empty_config() {
        let factory = ModelFactory::with_defaults();
        assert_eq!(factory.expand(&ModelConfig::new()).unwrap().count(), 0);
    }

    #[test]
    fn test_fresh_instances() {
        let factory = ModelFactory::with_defaults();
        let models = config("[LogisticRegression]\nC = [1.0]\n");
        let a = factory.expand(&models).unwrap().next().unwrap().unwrap();
        let b = factory.expand(&models).unwrap().next().unwrap().unwrap();
        assert_eq!(a.signature(), b.signature());
    }
}
