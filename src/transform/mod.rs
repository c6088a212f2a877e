//! Feature engineering collaborator.
//!
//! Parameters are fitted on the train frame of a partition and applied
//! unchanged to its test frame.

pub mod dummies;
pub mod imputer;
pub mod pipeline;
pub mod scaler;

pub use dummies::DummyEncoding;
pub use imputer::{fill_categorical, RegionalMeanImputer, RegionalMeans, UNKNOWN_CATEGORY};
pub use pipeline::{
    from_config, FeatureTransform, PassthroughTransform, TransformError, TransformPipeline,
};
pub use scaler::MinMaxBounds;
