//! TOML pipeline configuration.
//!
//! ```toml
//! [io]
//! input_path = "data/labels.csv"
//!
//! [cols]
//! x_cols = ["year", "region", "income"]
//! y_col = "label"
//!
//! [time]
//! start_year = 2008
//! end_year = 2017
//!
//! [models.LinearSVC]
//! C = [0.1, 1.0]
//! penalty = ["l2"]
//!
//! [models.GaussianNB]
//!
//! [matrix]
//! out_path = "out/results_"
//! percentage = 10.0
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::{column_names, METRIC_COLUMNS, TABLE_COLUMNS};
use crate::models::ModelConfig;
use crate::walkforward::SplitSpec;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unknown model family: {0}")]
    UnknownFamily(String),

    #[error("Invalid grid for {family}: {reason}")]
    InvalidGrid { family: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// `[io]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    pub input_path: PathBuf,
}

/// `[cols]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Feature columns, in the order they are handed to the models.
    pub x_cols: Vec<String>,
    /// Binary label column.
    pub y_col: String,
    /// Integer year column.
    #[serde(default = "default_time_col")]
    pub time_col: String,
}

fn default_time_col() -> String {
    "year".to_string()
}

/// `[transform.imputation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputationConfig {
    /// Categorical columns; nulls become `"unknown"` and they are not scaled.
    #[serde(default)]
    pub cols: Vec<String>,
    /// Location column used to group regional means.
    pub loc_col: String,
    /// Year column used to group regional means.
    #[serde(default = "default_time_col")]
    pub time_col: String,
    /// Test rows look up means from this many years earlier.
    #[serde(default = "default_lookup_lag")]
    pub lookup_lag_years: i32,
}

fn default_lookup_lag() -> i32 {
    4
}

/// `[transform.dummy]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DummyConfig {
    pub cols: Vec<String>,
    /// Keep at most this many categories per column.
    pub k: usize,
}

/// `[transform]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    pub imputation: ImputationConfig,
    #[serde(default)]
    pub dummy: Option<DummyConfig>,
}

/// `[matrix]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Prefix for result tables; partition `i` is written to `out_path + i + ".csv"`.
    pub out_path: String,
    /// Prefix for precision/recall curve files.
    #[serde(default)]
    pub pr_path: Option<String>,
    /// Prefix for ROC curve files.
    #[serde(default)]
    pub roc_path: Option<String>,
    /// Overrides the 20 result column names.
    #[serde(default)]
    pub col_list: Option<Vec<String>>,
    /// Top-k percentage for the headline metrics.
    pub percentage: f64,
    /// Metric column used to rank rows in the run summary.
    #[serde(default)]
    pub rank_by: Option<String>,
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub io: IoConfig,
    pub cols: ColumnConfig,
    pub time: SplitSpec,
    #[serde(default)]
    pub transform: Option<TransformConfig>,
    /// Model family name -> hyperparameter name -> candidate values.
    #[serde(default)]
    pub models: toml::Table,
    pub matrix: MatrixConfig,
}

impl PipelineConfig {
    /// Read, parse and validate a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a config from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed model grid.
    pub fn model_config(&self) -> Result<ModelConfig, ConfigError> {
        ModelConfig::from_table(&self.models)
    }

    /// Result column names: the override if given, else the defaults.
    pub fn table_columns(&self) -> Vec<String> {
        match &self.matrix.col_list {
            Some(columns) => columns.clone(),
            None => column_names(self.matrix.percentage),
        }
    }

    /// Column the run summary ranks by.
    pub fn rank_column(&self) -> String {
        match &self.matrix.rank_by {
            Some(column) => column.clone(),
            // f1 at the configured percentage
            None => self.table_columns()[4].clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cols.x_cols.is_empty() {
            return Err(ConfigError::Invalid("x_cols must not be empty".to_string()));
        }
        if self.cols.x_cols.contains(&self.cols.y_col) {
            return Err(ConfigError::Invalid(format!(
                "label column {} is listed as a feature",
                self.cols.y_col
            )));
        }

        if self.time.end_year < self.time.start_year {
            return Err(ConfigError::Invalid(format!(
                "end_year {} precedes start_year {}",
                self.time.end_year, self.time.start_year
            )));
        }
        let policy = &self.time.policy;
        if policy.step_years < 1 || policy.gap_years < 1 || policy.test_span_years < 1 {
            return Err(ConfigError::Invalid(
                "window policy values must be positive".to_string(),
            ));
        }

        let pct = self.matrix.percentage;
        if !(pct > 0.0 && pct <= 100.0) {
            return Err(ConfigError::Invalid(format!(
                "percentage must be in (0, 100], got {}",
                pct
            )));
        }
        if let Some(columns) = &self.matrix.col_list {
            if columns.len() != TABLE_COLUMNS {
                return Err(ConfigError::Invalid(format!(
                    "col_list must name {} columns, got {}",
                    TABLE_COLUMNS,
                    columns.len()
                )));
            }
        }
        if let Some(rank_by) = &self.matrix.rank_by {
            let columns = self.table_columns();
            let metric_columns = &columns[TABLE_COLUMNS - METRIC_COLUMNS..];
            if !metric_columns.contains(rank_by) {
                return Err(ConfigError::Invalid(format!(
                    "rank_by {} is not a metric column",
                    rank_by
                )));
            }
        }

        if let Some(transform) = &self.transform {
            let available = |name: &String| {
                self.cols.x_cols.contains(name) || name == &self.cols.time_col
            };
            let imputation = &transform.imputation;
            for name in [&imputation.loc_col, &imputation.time_col]
                .into_iter()
                .chain(&imputation.cols)
            {
                if !available(name) {
                    return Err(ConfigError::Invalid(format!(
                        "transform column {} is not a feature",
                        name
                    )));
                }
            }
            if let Some(dummy) = &transform.dummy {
                if let Some(name) = dummy.cols.iter().find(|name| !available(name)) {
                    return Err(ConfigError::Invalid(format!(
                        "dummy column {} is not a feature",
                        name
                    )));
                }
                if dummy.k == 0 {
                    return Err(ConfigError::Invalid("dummy.k must be at least 1".to_string()));
                }
            }
        }

        self.model_config()?;
        Ok(())
    }
}
