//! Per-model metrics rows.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ranking::Ranking;

/// Percentages at which precision and recall are always reported.
pub const THRESHOLDS: [f64; 7] = [1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 50.0];

/// Metric values per row: precision@100, accuracy, F1 and AUC at the
/// configured percentage, then precision/recall at each of [`THRESHOLDS`].
pub const METRIC_COLUMNS: usize = 4 + 2 * THRESHOLDS.len();

/// Identifying columns plus metric columns.
pub const TABLE_COLUMNS: usize = 2 + METRIC_COLUMNS;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Got {labels} labels but {scores} scores")]
    LengthMismatch { labels: usize, scores: usize },

    #[error("Score at position {index} is not finite: {value}")]
    NonFiniteScore { index: usize, value: f64 },

    #[error("Label at position {index} is not binary: {value}")]
    NonBinaryLabel { index: usize, value: u8 },

    #[error("Percentage must be in (0, 100], got {0}")]
    InvalidPercentage(f64),
}

/// Render a percentage for a column name: `10.0` -> `10`, `2.5` -> `2.5`.
fn format_pct(k: f64) -> String {
    if k.fract() == 0.0 {
        format!("{}", k as i64)
    } else {
        format!("{}", k)
    }
}

/// Default result column names for a configured percentage.
pub fn column_names(percentage: f64) -> Vec<String> {
    let p = format_pct(percentage);
    let mut names = vec![
        "family_name".to_string(),
        "param_signature".to_string(),
        "precision_at_100".to_string(),
        format!("accuracy_at_{}", p),
        format!("f1_at_{}", p),
        format!("auc_roc_at_{}", p),
    ];
    for k in THRESHOLDS {
        let k = format_pct(k);
        names.push(format!("precision_at_{}", k));
        names.push(format!("recall_at_{}", k));
    }
    names
}

/// Precision and recall at one percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdMetrics {
    pub k: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Metrics for one (partition, model) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub family: String,
    pub signature: String,
    pub precision_at_100: f64,
    pub accuracy: f64,
    pub f1: f64,
    pub auc_roc: f64,
    pub at_thresholds: Vec<ThresholdMetrics>,
}

impl ScoreRow {
    /// Metric values in column order.
    pub fn values(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(METRIC_COLUMNS);
        values.extend([self.precision_at_100, self.accuracy, self.f1, self.auc_roc]);
        for t in &self.at_thresholds {
            values.push(t.precision);
            values.push(t.recall);
        }
        values
    }

    /// One-line log summary.
    pub fn summary(&self) -> String {
        format!(
            "{}: precision@100={:.3} accuracy={:.3} f1={:.3} auc={:.3}",
            self.signature, self.precision_at_100, self.accuracy, self.f1, self.auc_roc
        )
    }
}

/// Computes [`ScoreRow`]s at a fixed headline percentage.
#[derive(Debug, Clone, Copy)]
pub struct MetricsCalculator {
    percentage: f64,
}

impl MetricsCalculator {
    pub fn new(percentage: f64) -> Result<Self, MetricsError> {
        if !(percentage > 0.0 && percentage <= 100.0) {
            return Err(MetricsError::InvalidPercentage(percentage));
        }
        Ok(Self { percentage })
    }

    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    /// Score one model's test predictions.
    ///
    /// `scores` may be margins or probabilities; only their order matters.
    pub fn score_row(
        &self,
        family: &str,
        signature: &str,
        labels: &[u8],
        scores: &[f64],
    ) -> Result<ScoreRow, MetricsError> {
        Self::check_inputs(labels, scores)?;
        let ranking = Ranking::new(labels, scores)?;

        let headline = ranking.confusion(self.percentage);
        let at_thresholds = THRESHOLDS
            .iter()
            .map(|&k| {
                let c = ranking.confusion(k);
                ThresholdMetrics {
                    k,
                    precision: c.precision(),
                    recall: c.recall(),
                }
            })
            .collect();

        Ok(ScoreRow {
            family: family.to_string(),
            signature: signature.to_string(),
            precision_at_100: ranking.confusion(100.0).precision(),
            accuracy: headline.accuracy(),
            f1: headline.f1(),
            auc_roc: headline.auc_roc(),
            at_thresholds,
        })
    }

    fn check_inputs(labels: &[u8], scores: &[f64]) -> Result<(), MetricsError> {
        if labels.len() != scores.len() {
            return Err(MetricsError::LengthMismatch {
                labels: labels.len(),
                scores: scores.len(),
            });
        }
        if let Some((index, &value)) = scores.iter().enumerate().find(|(_, s)| !s.is_finite()) {
            return Err(MetricsError::NonFiniteScore { index, value });
        }
        if let Some((index, &value)) = labels.iter().enumerate().find(|(_, l)| **l > 1) {
            return Err(MetricsError::NonBinaryLabel { index, value });
        }
        Ok(())
    }
}
