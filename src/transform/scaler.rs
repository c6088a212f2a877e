//! Min-max scaling with bounds taken from the training frame.

use polars::prelude::*;

use super::imputer::float_values;
use super::pipeline::TransformError;

/// Per-column (min, max) learned from train.
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxBounds {
    bounds: Vec<(String, f64, f64)>,
}

impl MinMaxBounds {
    /// Learn bounds for `columns`. An all-null column gets (0, 0).
    pub fn fit(frame: &DataFrame, columns: &[String]) -> Result<Self, TransformError> {
        let mut bounds = Vec::with_capacity(columns.len());
        for name in columns {
            let values = float_values(frame, name)?;
            let (min, max) = values
                .iter()
                .flatten()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            if min.is_finite() {
                bounds.push((name.clone(), min, max));
            } else {
                bounds.push((name.clone(), 0.0, 0.0));
            }
        }
        Ok(Self { bounds })
    }

    pub fn get(&self, column: &str) -> Option<(f64, f64)> {
        self.bounds
            .iter()
            .find(|(name, _, _)| name == column)
            .map(|(_, min, max)| (*min, *max))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.bounds.iter().map(|(name, _, _)| name.as_str())
    }

    /// Scale into [0, 1] relative to train. Test values outside the train
    /// range land outside [0, 1]; a constant train column maps to `x - min`.
    pub fn apply(&self, frame: &DataFrame) -> Result<DataFrame, TransformError> {
        let mut out = frame.clone();
        for (name, min, max) in &self.bounds {
            let range = max - min;
            let scaled: Vec<Option<f64>> = float_values(frame, name)?
                .into_iter()
                .map(|value| {
                    value.map(|v| if range > 0.0 { (v - min) / range } else { v - min })
                })
                .collect();
            out.with_column(Series::new(name.as_str().into(), scaled))?;
        }
        Ok(out)
    }
}
