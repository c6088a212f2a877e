//! One-hot encoding capped at the `k` most frequent train categories.

use std::collections::HashMap;

use polars::prelude::*;

use super::imputer::string_keys;
use super::pipeline::TransformError;

/// Suffix of the catch-all column written when categories are capped.
pub const OTHERS_SUFFIX: &str = "others";

/// Categories kept for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyEncoding {
    column: String,
    categories: Vec<String>,
    capped: bool,
}

impl DummyEncoding {
    /// Keep every train category when there are at most `k`; otherwise keep
    /// the `k` most frequent (ties by value) and route the rest to `others`.
    pub fn fit(frame: &DataFrame, column: &str, k: usize) -> Result<Self, TransformError> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for value in string_keys(frame, column)?.into_iter().flatten() {
            *counts.entry(value).or_insert(0) += 1;
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let capped = ranked.len() > k;
        let categories = ranked.into_iter().take(k).map(|(value, _)| value).collect();

        Ok(Self {
            column: column.to_string(),
            categories,
            capped,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn is_capped(&self) -> bool {
        self.capped
    }

    /// Names of the indicator columns, in output order.
    pub fn output_columns(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .categories
            .iter()
            .map(|category| format!("{}_{}", self.column, category))
            .collect();
        if self.capped {
            names.push(format!("{}_{}", self.column, OTHERS_SUFFIX));
        }
        names
    }

    /// Replace the source column with 0/1 indicator columns.
    ///
    /// Values never seen in train set no kept indicator; they count as
    /// `others` only when the encoding is capped.
    pub fn apply(&self, frame: &DataFrame) -> Result<DataFrame, TransformError> {
        let values = string_keys(frame, &self.column)?;
        let mut out = frame.drop(&self.column)?;

        for (category, name) in self.categories.iter().zip(self.output_columns()) {
            let indicator: Vec<f64> = values
                .iter()
                .map(|v| if v.as_deref() == Some(category.as_str()) { 1.0 } else { 0.0 })
                .collect();
            out.with_column(Series::new(name.as_str().into(), indicator))?;
        }

        if self.capped {
            let name = format!("{}_{}", self.column, OTHERS_SUFFIX);
            let indicator: Vec<f64> = values
                .iter()
                .map(|v| match v {
                    Some(value) if !self.categories.contains(value) => 1.0,
                    _ => 0.0,
                })
                .collect();
            out.with_column(Series::new(name.as_str().into(), indicator))?;
        }

        Ok(out)
    }
}
