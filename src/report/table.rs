//! Per-partition results table.

use std::fs;
use std::path::Path;

use polars::prelude::*;
use thiserror::Error;

use crate::metrics::{ScoreRow, METRIC_COLUMNS, TABLE_COLUMNS};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown metric column: {0}")]
    UnknownColumn(String),

    #[error("Expected {expected} column names, got {got}")]
    ColumnCount { expected: usize, got: usize },
}

/// Create the parent directory of an output path.
pub(crate) fn ensure_parent(path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Rows in model enumeration order under fixed column names.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsTable {
    columns: Vec<String>,
    rows: Vec<ScoreRow>,
}

impl ResultsTable {
    pub fn new(columns: Vec<String>) -> Result<Self, ReportError> {
        if columns.len() != TABLE_COLUMNS {
            return Err(ReportError::ColumnCount {
                expected: TABLE_COLUMNS,
                got: columns.len(),
            });
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ScoreRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: ScoreRow) {
        self.rows.push(row);
    }

    /// Position of a metric column within [`ScoreRow::values`].
    fn metric_index(&self, column: &str) -> Result<usize, ReportError> {
        self.columns[TABLE_COLUMNS - METRIC_COLUMNS..]
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| ReportError::UnknownColumn(column.to_string()))
    }

    /// Rows ordered by a metric column, highest first; ties keep table order.
    pub fn ranked_by(&self, column: &str) -> Result<Vec<&ScoreRow>, ReportError> {
        let j = self.metric_index(column)?;
        let mut ranked: Vec<(&ScoreRow, f64)> =
            self.rows.iter().map(|row| (row, row.values()[j])).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked.into_iter().map(|(row, _)| row).collect())
    }

    /// Best row under `column` and its value.
    pub fn best_by(&self, column: &str) -> Result<Option<(&ScoreRow, f64)>, ReportError> {
        let j = self.metric_index(column)?;
        Ok(self
            .ranked_by(column)?
            .into_iter()
            .next()
            .map(|row| (row, row.values()[j])))
    }

    pub fn to_frame(&self) -> Result<DataFrame, ReportError> {
        let families: Vec<&str> = self.rows.iter().map(|r| r.family.as_str()).collect();
        let signatures: Vec<&str> = self.rows.iter().map(|r| r.signature.as_str()).collect();

        let mut columns: Vec<Column> = vec![
            Series::new(self.columns[0].as_str().into(), families).into(),
            Series::new(self.columns[1].as_str().into(), signatures).into(),
        ];

        let values: Vec<Vec<f64>> = self.rows.iter().map(ScoreRow::values).collect();
        for (j, name) in self.columns[2..].iter().enumerate() {
            let column: Vec<f64> = values.iter().map(|row| row[j]).collect();
            columns.push(Series::new(name.as_str().into(), column).into());
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Write as CSV with a header and no index column.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let mut frame = self.to_frame()?;
        let mut file = fs::File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut frame)?;
        Ok(())
    }
}
