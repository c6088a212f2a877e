//! Classifier families and the factory that materializes them from a
//! hyperparameter grid.

pub mod boosting;
pub mod classifier;
pub mod factory;
pub mod forest;
pub mod grid;
pub mod knn;
pub mod linear;
pub mod naive_bayes;
pub mod params;
pub mod registry;
pub mod tree;

pub use boosting::{AdaBoost, GradientBoosting};
pub use classifier::{Classifier, ModelError, ScoreKind};
pub use factory::{ModelFactory, ModelInstance, ModelIter};
pub use forest::TreeEnsemble;
pub use grid::{Combinations, FamilyGrid, ModelConfig};
pub use knn::KNeighbors;
pub use linear::{LinearSvc, LogisticRegression};
pub use naive_bayes::GaussianNb;
pub use params::{ParamSet, ParamValue};
pub use registry::{Constructor, ModelRegistry};
pub use tree::DecisionTree;
