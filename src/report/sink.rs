//! Diagnostic curve output per (model, partition).

use std::fs;
use std::path::PathBuf;

use polars::prelude::*;
use tracing::debug;

use crate::config::MatrixConfig;
use crate::metrics::{precision_recall_curve, roc_curve};

use super::table::{ensure_parent, ReportError};

/// Receives the raw test scores of every fitted model.
pub trait CurveSink {
    fn record(
        &mut self,
        family: &str,
        partition: usize,
        row: usize,
        labels: &[u8],
        scores: &[f64],
    ) -> Result<(), ReportError>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCurveSink;

impl CurveSink for NullCurveSink {
    fn record(&mut self, _: &str, _: usize, _: usize, _: &[u8], _: &[f64]) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Writes precision/recall and ROC series as CSV files under path prefixes.
#[derive(Debug, Clone, Default)]
pub struct CsvCurveSink {
    pr_path: Option<String>,
    roc_path: Option<String>,
    files_written: usize,
}

impl CsvCurveSink {
    pub fn new(pr_path: Option<String>, roc_path: Option<String>) -> Self {
        Self {
            pr_path,
            roc_path,
            files_written: 0,
        }
    }

    /// Number of curve files written so far.
    pub fn files_written(&self) -> usize {
        self.files_written
    }

    fn write(&mut self, path: PathBuf, mut frame: DataFrame) -> Result<(), ReportError> {
        ensure_parent(&path)?;
        let mut file = fs::File::create(&path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut frame)?;
        debug!("Wrote {}", path.display());
        self.files_written += 1;
        Ok(())
    }
}

impl CurveSink for CsvCurveSink {
    fn record(
        &mut self,
        family: &str,
        partition: usize,
        row: usize,
        labels: &[u8],
        scores: &[f64],
    ) -> Result<(), ReportError> {
        if let Some(prefix) = self.pr_path.clone() {
            let curve = precision_recall_curve(labels, scores);
            let frame = DataFrame::new(vec![
                Series::new("threshold".into(), curve.iter().map(|p| p.threshold).collect::<Vec<_>>()).into(),
                Series::new(
                    "population_fraction".into(),
                    curve.iter().map(|p| p.population_fraction).collect::<Vec<_>>(),
                )
                .into(),
                Series::new("precision".into(), curve.iter().map(|p| p.precision).collect::<Vec<_>>()).into(),
                Series::new("recall".into(), curve.iter().map(|p| p.recall).collect::<Vec<_>>()).into(),
            ])?;
            let path = format!("{}precision_recall_curve_{}_{}_{}.csv", prefix, family, partition, row);
            self.write(PathBuf::from(path), frame)?;
        }

        if let Some(prefix) = self.roc_path.clone() {
            let curve = roc_curve(labels, scores);
            let frame = DataFrame::new(vec![
                Series::new("threshold".into(), curve.iter().map(|p| p.threshold).collect::<Vec<_>>()).into(),
                Series::new("fpr".into(), curve.iter().map(|p| p.fpr).collect::<Vec<_>>()).into(),
                Series::new("tpr".into(), curve.iter().map(|p| p.tpr).collect::<Vec<_>>()).into(),
            ])?;
            let path = format!("{}roc_curve_{}_{}_{}.csv", prefix, family, partition, row);
            self.write(PathBuf::from(path), frame)?;
        }

        Ok(())
    }
}

/// A CSV sink when any curve path is configured, otherwise a null sink.
pub fn from_config(config: &MatrixConfig) -> Box<dyn CurveSink> {
    if config.pr_path.is_none() && config.roc_path.is_none() {
        Box::new(NullCurveSink)
    } else {
        Box::new(CsvCurveSink::new(config.pr_path.clone(), config.roc_path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_both_curves() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = format!("{}/", dir.path().display());
        let mut sink = CsvCurveSink::new(Some(format!("{}pr/", prefix)), Some(prefix.clone()));

        sink.record("LinearSVC", 2, 0, &[1, 0, 1, 0], &[0.9, 0.4, 0.3, 0.1])
            .unwrap();
        assert_eq!(sink.files_written(), 2);

        let pr = dir.path().join("pr").join("precision_recall_curve_LinearSVC_2_0.csv");
        let roc = dir.path().join("roc_curve_LinearSVC_2_0.csv");
        let pr_text = fs::read_to_string(pr).unwrap();
        assert!(pr_text.starts_with("threshold,population_fraction,precision,recall"));
        assert_eq!(pr_text.lines().count(), 5);
        // infinite start point plus four distinct scores
        assert_eq!(fs::read_to_string(roc).unwrap().lines().count(), 6);
    }

    #[test]
    fn test_single_class_roc_is_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = format!("{}/", dir.path().display());
        let mut sink = CsvCurveSink::new(None, Some(prefix));
        sink.record("GaussianNB", 1, 3, &[0, 0], &[0.2, 0.1]).unwrap();
        let text = fs::read_to_string(dir.path().join("roc_curve_GaussianNB_1_3.csv")).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_null_sink_without_paths() {
        let config = MatrixConfig {
            out_path: "out/results_".to_string(),
            pr_path: None,
            roc_path: None,
            col_list: None,
            percentage: 10.0,
            rank_by: None,
        };
        let mut sink = from_config(&config);
        assert!(sink.record("A", 1, 0, &[1], &[0.5]).is_ok());
    }
}
