//! Hyperparameter grids and lazy Cartesian expansion.

use serde::Serialize;

use crate::config::ConfigError;

use super::params::{ParamSet, ParamValue};

/// Candidate values for every hyperparameter of one model family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyGrid {
    pub family: String,
    /// Hyperparameter name -> candidates, in declaration order.
    pub params: Vec<(String, Vec<ParamValue>)>,
}

impl FamilyGrid {
    pub fn new(family: &str) -> Self {
        Self {
            family: family.to_string(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: &str, candidates: Vec<ParamValue>) -> Self {
        self.params.push((name.to_string(), candidates));
        self
    }

    /// Calculate total number of parameter combinations.
    pub fn total_combinations(&self) -> usize {
        self.params.iter().map(|(_, values)| values.len()).product()
    }

    /// Lazily enumerate every combination, last parameter varying fastest.
    pub fn combinations(&self) -> Combinations<'_> {
        Combinations::new(&self.params)
    }
}

/// Ordered list of model family grids.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelConfig {
    pub families: Vec<FamilyGrid>,
}

impl ModelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_family(mut self, grid: FamilyGrid) -> Self {
        self.families.push(grid);
        self
    }

    /// Build from a `[models]` table. A scalar candidate is treated as a
    /// single-element list.
    pub fn from_table(table: &toml::Table) -> Result<Self, ConfigError> {
        let mut families = Vec::with_capacity(table.len());

        for (family, value) in table {
            let params_table = value.as_table().ok_or_else(|| ConfigError::InvalidGrid {
                family: family.clone(),
                reason: "expected a table of hyperparameters".to_string(),
            })?;

            let mut grid = FamilyGrid::new(family);
            for (name, candidates) in params_table {
                let values = match candidates {
                    toml::Value::Array(items) => items
                        .iter()
                        .map(|item| scalar(family, name, item))
                        .collect::<Result<Vec<_>, _>>()?,
                    other => vec![scalar(family, name, other)?],
                };
                if values.is_empty() {
                    return Err(ConfigError::InvalidGrid {
                        family: family.clone(),
                        reason: format!("{} has no candidate values", name),
                    });
                }
                grid.params.push((name.clone(), values));
            }
            families.push(grid);
        }

        Ok(Self { families })
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn total_combinations(&self) -> usize {
        self.families.iter().map(FamilyGrid::total_combinations).sum()
    }
}

fn scalar(family: &str, name: &str, value: &toml::Value) -> Result<ParamValue, ConfigError> {
    ParamValue::from_toml(value).ok_or_else(|| ConfigError::InvalidGrid {
        family: family.to_string(),
        reason: format!("{} has a non-scalar candidate {}", name, value),
    })
}

/// Odometer over a list of candidate lists.
#[derive(Debug, Clone)]
pub struct Combinations<'a> {
    params: &'a [(String, Vec<ParamValue>)],
    cursor: Option<Vec<usize>>,
}

impl<'a> Combinations<'a> {
    /// An empty parameter list yields exactly one empty set.
    pub fn new(params: &'a [(String, Vec<ParamValue>)]) -> Self {
        let cursor = if params.iter().any(|(_, values)| values.is_empty()) {
            None
        } else {
            Some(vec![0; params.len()])
        };
        Self { params, cursor }
    }
}

impl Iterator for Combinations<'_> {
    type Item = ParamSet;

    fn next(&mut self) -> Option<ParamSet> {
        let cursor = self.cursor.as_mut()?;

        let mut set = ParamSet::new();
        for ((name, values), &i) in self.params.iter().zip(cursor.iter()) {
            set.push(name, values[i].clone());
        }

        let mut exhausted = true;
        for pos in (0..cursor.len()).rev() {
            cursor[pos] += 1;
            if cursor[pos] < self.params[pos].1.len() {
                exhausted = false;
                break;
            }
            cursor[pos] = 0;
        }
        if exhausted {
            self.cursor = None;
        }

        Some(set)
    }
}
