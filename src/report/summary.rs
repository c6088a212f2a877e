//! JSON run summary written after the last partition.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::table::{ensure_parent, ReportError, ResultsTable};

/// Best row of a partition under the ranking column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestModel {
    pub family: String,
    pub signature: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSummary {
    pub index: usize,
    pub cut_year: i32,
    pub test_start: i32,
    pub test_end: i32,
    pub train_rows: usize,
    pub test_rows: usize,
    pub test_positives: usize,
    pub table_path: String,
    pub models: usize,
    pub best: Option<BestModel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub input_path: String,
    pub percentage: f64,
    pub rank_by: String,
    pub partitions: Vec<PartitionSummary>,
}

impl RunSummary {
    pub fn start(input_path: &str, percentage: f64, rank_by: &str) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            input_path: input_path.to_string(),
            percentage,
            rank_by: rank_by.to_string(),
            partitions: Vec::new(),
        }
    }

    /// Best model of a finished table under this run's ranking column.
    pub fn best_of(&self, table: &ResultsTable) -> Result<Option<BestModel>, ReportError> {
        Ok(table.best_by(&self.rank_by)?.map(|(row, value)| BestModel {
            family: row.family.clone(),
            signature: row.signature.clone(),
            value,
        }))
    }

    pub fn push(&mut self, partition: PartitionSummary) {
        self.partitions.push(partition);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
