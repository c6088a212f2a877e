pub mod settings;

pub use settings::{
    ColumnConfig, ConfigError, DummyConfig, ImputationConfig, IoConfig, MatrixConfig,
    PipelineConfig, TransformConfig,
};
