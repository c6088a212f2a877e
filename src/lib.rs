pub mod config;
pub mod data;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod transform;
pub mod walkforward;

// Re-export commonly used types
pub use config::{ConfigError, PipelineConfig};
pub use data::{ColumnRoles, DataError, DataLoader, Dataset, FeatureMatrix, Partition};
pub use metrics::{MetricsCalculator, ScoreRow};
pub use models::{Classifier, ModelConfig, ModelFactory, ModelInstance, ModelRegistry};
pub use pipeline::{PipelineError, PipelineRunner, RunReport};
pub use report::{ResultsTable, RunSummary};
pub use transform::{FeatureTransform, TransformPipeline};
pub use walkforward::{SplitSpec, TemporalSplitter, TemporalWindow};
