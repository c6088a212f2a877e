//! Categorical fill and regional-mean imputation.
//!
//! Numeric nulls are filled with the train mean of the same column for the
//! same (location, year) cell. Fitting returns an immutable [`RegionalMeans`]
//! table; applying it never mutates the table. Test rows look their cell up
//! `lookup_lag_years` earlier, since the same years are not in train.

use std::collections::HashMap;

use polars::prelude::*;

use crate::config::ImputationConfig;

use super::pipeline::{column, TransformError};

/// Placeholder for missing categorical values.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Cast the categorical columns to strings and fill their nulls.
pub fn fill_categorical(frame: &DataFrame, columns: &[String]) -> Result<DataFrame, TransformError> {
    let mut out = frame.clone();
    for name in columns {
        let values: Vec<String> = column(frame, name)?
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or(UNKNOWN_CATEGORY).to_string())
            .collect();
        out.with_column(Series::new(name.as_str().into(), values))?;
    }
    Ok(out)
}

pub(crate) fn string_keys(frame: &DataFrame, name: &str) -> Result<Vec<Option<String>>, TransformError> {
    Ok(column(frame, name)?
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

pub(crate) fn float_values(frame: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, TransformError> {
    let series = column(frame, name)?;
    if matches!(series.dtype(), DataType::String) {
        return Err(TransformError::NonNumericColumn(name.to_string()));
    }
    Ok(series.cast(&DataType::Float64)?.f64()?.into_iter().collect())
}

fn year_values(frame: &DataFrame, name: &str) -> Result<Vec<Option<i32>>, TransformError> {
    Ok(column(frame, name)?
        .cast(&DataType::Int32)?
        .i32()?
        .into_iter()
        .collect())
}

/// Fits [`RegionalMeans`] from a training frame.
#[derive(Debug, Clone)]
pub struct RegionalMeanImputer {
    loc_col: String,
    time_col: String,
    /// Categorical columns; never imputed.
    categorical: Vec<String>,
    lookup_lag_years: i32,
}

impl RegionalMeanImputer {
    pub fn new(config: &ImputationConfig) -> Self {
        Self {
            loc_col: config.loc_col.clone(),
            time_col: config.time_col.clone(),
            categorical: config.cols.clone(),
            lookup_lag_years: config.lookup_lag_years,
        }
    }

    pub fn lookup_lag_years(&self) -> i32 {
        self.lookup_lag_years
    }

    /// Columns that receive imputation: everything except location, time and
    /// the categorical columns.
    fn target_columns(&self, frame: &DataFrame) -> Vec<String> {
        frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .filter(|name| {
                name != &self.loc_col && name != &self.time_col && !self.categorical.contains(name)
            })
            .collect()
    }

    pub fn fit(&self, train: &DataFrame) -> Result<RegionalMeans, TransformError> {
        let columns = self.target_columns(train);
        let locs = string_keys(train, &self.loc_col)?;
        let years = year_values(train, &self.time_col)?;

        // (sum, count) per cell and column
        let mut acc: HashMap<(String, i32), Vec<(f64, usize)>> = HashMap::new();
        let mut global = Vec::with_capacity(columns.len());

        for (j, name) in columns.iter().enumerate() {
            let values = float_values(train, name)?;
            let (mut sum, mut count) = (0.0, 0usize);
            for (i, value) in values.iter().enumerate() {
                let Some(v) = value else { continue };
                sum += v;
                count += 1;
                if let (Some(loc), Some(year)) = (&locs[i], years[i]) {
                    let cell = acc
                        .entry((loc.clone(), year))
                        .or_insert_with(|| vec![(0.0, 0); columns.len()]);
                    cell[j].0 += v;
                    cell[j].1 += 1;
                }
            }
            global.push(if count > 0 { sum / count as f64 } else { 0.0 });
        }

        let cells = acc
            .into_iter()
            .map(|(key, sums)| {
                let means = sums
                    .into_iter()
                    .map(|(s, c)| if c > 0 { Some(s / c as f64) } else { None })
                    .collect();
                (key, means)
            })
            .collect();

        Ok(RegionalMeans {
            loc_col: self.loc_col.clone(),
            time_col: self.time_col.clone(),
            columns,
            cells,
            global,
        })
    }
}

/// Train means per (location, year, column), plus global train means.
#[derive(Debug, Clone)]
pub struct RegionalMeans {
    loc_col: String,
    time_col: String,
    columns: Vec<String>,
    cells: HashMap<(String, i32), Vec<Option<f64>>>,
    global: Vec<f64>,
}

impl RegionalMeans {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Mean of `column` for one cell, if the cell had any non-null values.
    pub fn lookup(&self, loc: &str, year: i32, column: &str) -> Option<f64> {
        let j = self.columns.iter().position(|c| c == column)?;
        self.cells
            .get(&(loc.to_string(), year))
            .and_then(|means| means[j])
    }

    /// Global train mean; 0.0 for an all-null column.
    pub fn global_mean(&self, column: &str) -> Option<f64> {
        let j = self.columns.iter().position(|c| c == column)?;
        Some(self.global[j])
    }

    /// Fill nulls in a new frame, looking cells up `lag_years` earlier.
    pub fn apply(&self, frame: &DataFrame, lag_years: i32) -> Result<DataFrame, TransformError> {
        let locs = string_keys(frame, &self.loc_col)?;
        let years = year_values(frame, &self.time_col)?;
        let mut out = frame.clone();

        for (j, name) in self.columns.iter().enumerate() {
            let values = float_values(frame, name)?;
            let filled: Vec<f64> = values
                .into_iter()
                .enumerate()
                .map(|(i, value)| {
                    value.unwrap_or_else(|| {
                        let cell = match (&locs[i], years[i]) {
                            (Some(loc), Some(year)) => self
                                .cells
                                .get(&(loc.clone(), year - lag_years))
                                .and_then(|means| means[j]),
                            _ => None,
                        };
                        cell.unwrap_or(self.global[j])
                    })
                })
                .collect();
            out.with_column(Series::new(name.as_str().into(), filled))?;
        }

        Ok(out)
    }
}
