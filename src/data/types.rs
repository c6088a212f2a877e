//! Core data types for rolling-origin evaluation.
//!
//! A [`Dataset`] is a flat table of entity-year observations with explicit
//! column roles. A [`Partition`] is one train/test pair cut out of it.

use polars::prelude::*;
use thiserror::Error;

use crate::walkforward::TemporalWindow;

use super::matrix::extract_labels;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Column {column} has {count} null values")]
    NullValues { column: String, count: usize },

    #[error("Label column {column} contains non-binary value {value}")]
    NonBinaryLabel { column: String, value: f64 },

    #[error("Feature column {0} is not numeric")]
    NonNumericFeature(String),

    #[error("Empty {side} set for cut year {cut_year}")]
    EmptyPartition { cut_year: i32, side: &'static str },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Which column plays which part in the evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRoles {
    /// Feature columns as configured.
    pub features: Vec<String>,
    /// Binary label column.
    pub label: String,
    /// Integer year column.
    pub time: String,
}

impl ColumnRoles {
    pub fn new(features: Vec<String>, label: &str, time: &str) -> Self {
        Self {
            features,
            label: label.to_string(),
            time: time.to_string(),
        }
    }

    /// Columns kept alongside the label: the features plus the time column.
    pub fn feature_columns(&self) -> Vec<String> {
        let mut columns = self.features.clone();
        if !columns.iter().any(|c| c == &self.time) {
            columns.push(self.time.clone());
        }
        columns
    }
}

/// Validated tabular dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    roles: ColumnRoles,
}

impl Dataset {
    /// Validate a raw frame against the column roles.
    ///
    /// Rows with a null label are dropped. Remaining labels must be 0/1 and
    /// every row must carry a year.
    pub fn new(frame: DataFrame, roles: ColumnRoles) -> Result<Self, DataError> {
        if roles.features.iter().any(|c| c == &roles.label) {
            return Err(DataError::InvalidData(format!(
                "label column {} is also listed as a feature",
                roles.label
            )));
        }

        let mut wanted = roles.feature_columns();
        wanted.push(roles.label.clone());

        let present: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        for column in &wanted {
            if !present.contains(column) {
                return Err(DataError::MissingColumn(column.clone()));
            }
        }

        let mut frame = frame
            .select(wanted.iter().map(|c| c.as_str()))?
            .lazy()
            .filter(col(roles.label.as_str()).is_not_null())
            .collect()?;

        let time = frame.column(&roles.time)?.cast(&DataType::Int32)?;
        if time.null_count() > 0 {
            return Err(DataError::NullValues {
                column: roles.time.clone(),
                count: time.null_count(),
            });
        }
        frame.with_column(time)?;

        // Fail early rather than at the first partition.
        extract_labels(&frame, &roles.label)?;

        Ok(Self { frame, roles })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn roles(&self) -> &ColumnRoles {
        &self.roles
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Earliest and latest observed year.
    pub fn year_range(&self) -> Result<Option<(i32, i32)>, DataError> {
        let years = self.frame.column(&self.roles.time)?.i32()?;
        Ok(years.min().zip(years.max()))
    }

    /// Cut the train/test pair for one window.
    pub fn partition(&self, window: &TemporalWindow) -> Result<Partition, DataError> {
        let year = col(self.roles.time.as_str());

        let train = self
            .frame
            .clone()
            .lazy()
            .filter(year.clone().lt_eq(lit(window.cut_year)))
            .collect()?;
        let test = self
            .frame
            .clone()
            .lazy()
            .filter(
                year.clone()
                    .gt_eq(lit(window.test_start))
                    .and(year.lt_eq(lit(window.test_end))),
            )
            .collect()?;

        if train.height() == 0 {
            return Err(DataError::EmptyPartition {
                cut_year: window.cut_year,
                side: "train",
            });
        }
        if test.height() == 0 {
            return Err(DataError::EmptyPartition {
                cut_year: window.cut_year,
                side: "test",
            });
        }

        let train_labels = extract_labels(&train, &self.roles.label)?;
        let test_labels = extract_labels(&test, &self.roles.label)?;

        Ok(Partition {
            window: *window,
            train: train.drop(&self.roles.label)?,
            test: test.drop(&self.roles.label)?,
            train_labels,
            test_labels,
        })
    }
}

/// One train/test pair. Consumed once by the pipeline and then dropped.
#[derive(Debug, Clone)]
pub struct Partition {
    pub window: TemporalWindow,
    /// Training features (feature columns plus the time column).
    pub train: DataFrame,
    /// Test features, same columns as `train`.
    pub test: DataFrame,
    pub train_labels: Vec<u8>,
    pub test_labels: Vec<u8>,
}

impl Partition {
    pub fn train_rows(&self) -> usize {
        self.train.height()
    }

    pub fn test_rows(&self) -> usize {
        self.test.height()
    }

    /// Number of positive labels in the test set.
    pub fn test_positives(&self) -> usize {
        self.test_labels.iter().filter(|&&l| l == 1).count()
    }
}
