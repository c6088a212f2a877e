//! Rolling-origin evaluation loop.
//!
//! For each partition, in increasing cut-year order:
//! 1. Fit the feature transform on train and apply it to both sides
//! 2. For each model from the factory: fit, score the test set, compute the
//!    metrics row, hand the raw scores to the curve sink, drop the model
//! 3. Write the partition's results table
//!
//! Any error aborts the run. A failing model is never skipped.

use std::fmt;
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, PipelineConfig};
use crate::data::{ColumnRoles, DataError, DataLoader, Dataset, FeatureMatrix, Partition};
use crate::metrics::{MetricsCalculator, MetricsError};
use crate::models::{ModelConfig, ModelError, ModelFactory};
use crate::report::{self, CurveSink, PartitionSummary, ReportError, ResultsTable, RunSummary};
use crate::transform::{self, FeatureTransform, TransformError};
use crate::walkforward::split;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("{signature} failed on partition with cut year {cut_year}: {source}")]
    Model {
        family: String,
        signature: String,
        cut_year: i32,
        #[source]
        source: ModelError,
    },

    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Where the runner is within a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    AwaitingPartition,
    Transforming,
    FittingModel,
    Scoring,
    Accumulating,
    Done,
}

impl PipelineStage {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::AwaitingPartition => "awaiting_partition",
            PipelineStage::Transforming => "transforming",
            PipelineStage::FittingModel => "fitting_model",
            PipelineStage::Scoring => "scoring",
            PipelineStage::Accumulating => "accumulating",
            PipelineStage::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn enter(stage: PipelineStage, partition: usize) {
    debug!("partition {}: {}", partition, stage);
}

/// Outputs of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// One results table per partition, in partition order.
    pub tables: Vec<PathBuf>,
    pub summary: RunSummary,
    pub summary_path: PathBuf,
}

/// Drives the splitter, transform, factory and metrics over a dataset.
pub struct PipelineRunner {
    config: PipelineConfig,
    factory: ModelFactory,
    show_progress: bool,
}

impl PipelineRunner {
    /// Runner with the default model registry.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_factory(config, ModelFactory::with_defaults())
    }

    pub fn with_factory(config: PipelineConfig, factory: ModelFactory) -> Self {
        Self {
            config,
            factory,
            show_progress: false,
        }
    }

    /// Show a progress bar over the models of each partition.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn roles(&self) -> ColumnRoles {
        ColumnRoles::new(
            self.config.cols.x_cols.clone(),
            &self.config.cols.y_col,
            &self.config.cols.time_col,
        )
    }

    /// `out_path + index + ".csv"`.
    pub fn table_path(&self, index: usize) -> PathBuf {
        PathBuf::from(format!("{}{}.csv", self.config.matrix.out_path, index))
    }

    pub fn summary_path(&self) -> PathBuf {
        PathBuf::from(format!("{}summary.json", self.config.matrix.out_path))
    }

    /// Load the configured input file and evaluate it.
    pub fn run(&self) -> Result<RunReport, PipelineError> {
        // config problems surface before any data is read
        let (model_config, n_models) = self.check_models()?;
        let dataset = DataLoader::new(&self.config.io.input_path).load_dataset(self.roles())?;
        self.evaluate(&dataset, &model_config, n_models)
    }

    /// Evaluate an already loaded dataset.
    pub fn run_dataset(&self, dataset: &Dataset) -> Result<RunReport, PipelineError> {
        let (model_config, n_models) = self.check_models()?;
        self.evaluate(dataset, &model_config, n_models)
    }

    /// Validate the config and build every model once; returns the grid and
    /// its instance count.
    fn check_models(&self) -> Result<(ModelConfig, usize), PipelineError> {
        self.config.validate()?;
        let model_config = self.config.model_config()?;
        let count = self.factory.validate(&model_config)?;
        info!(
            "Model grid: {} families, {} instances",
            model_config.families.len(),
            count
        );
        if count == 0 {
            warn!("No models configured; tables will have no rows");
        }
        Ok((model_config, count))
    }

    fn evaluate(
        &self,
        dataset: &Dataset,
        model_config: &ModelConfig,
        n_models: usize,
    ) -> Result<RunReport, PipelineError> {
        let calculator = MetricsCalculator::new(self.config.matrix.percentage)?;
        let transform = transform::from_config(self.config.transform.as_ref(), &self.config.cols.time_col);
        let mut sink = report::sink::from_config(&self.config.matrix);
        let mut summary = RunSummary::start(
            &self.config.io.input_path.display().to_string(),
            calculator.percentage(),
            &self.config.rank_column(),
        );

        let splitter = split(dataset, &self.config.time);
        let total = splitter.total();
        if total == 0 {
            warn!(
                "Year range {}..={} is too short for a single partition",
                self.config.time.start_year, self.config.time.end_year
            );
        }
        info!("Evaluating {} partitions", total);

        let mut tables = Vec::with_capacity(total);
        for partition in splitter {
            enter(PipelineStage::AwaitingPartition, tables.len() + 1);
            let partition = partition?;
            let index = partition.window.index;

            let table = self.evaluate_partition(
                &partition,
                model_config,
                n_models,
                &calculator,
                transform.as_ref(),
                sink.as_mut(),
            )?;

            let path = self.table_path(index);
            table.write_csv(&path)?;
            info!(
                "Partition {} (cut year {}): wrote {} rows to {}",
                index,
                partition.window.cut_year,
                table.len(),
                path.display()
            );

            let best = summary.best_of(&table)?;
            summary.push(PartitionSummary {
                index,
                cut_year: partition.window.cut_year,
                test_start: partition.window.test_start,
                test_end: partition.window.test_end,
                train_rows: partition.train_rows(),
                test_rows: partition.test_rows(),
                test_positives: partition.test_positives(),
                table_path: path.display().to_string(),
                models: table.len(),
                best,
            });
            tables.push(path);
        }

        enter(PipelineStage::Done, tables.len());
        summary.finish();
        let summary_path = self.summary_path();
        summary.write(&summary_path)?;
        info!("Wrote run summary to {}", summary_path.display());

        Ok(RunReport {
            tables,
            summary,
            summary_path,
        })
    }

    fn evaluate_partition(
        &self,
        partition: &Partition,
        model_config: &ModelConfig,
        n_models: usize,
        calculator: &MetricsCalculator,
        transform: &dyn FeatureTransform,
        sink: &mut dyn CurveSink,
    ) -> Result<ResultsTable, PipelineError> {
        let window = &partition.window;
        info!(
            "Partition {}: train <= {} ({} rows), test {}..={} ({} rows, {} positive)",
            window.index,
            window.cut_year,
            partition.train_rows(),
            window.test_start,
            window.test_end,
            partition.test_rows(),
            partition.test_positives()
        );

        enter(PipelineStage::Transforming, window.index);
        let (train, test) = transform.fit_apply(&partition.train, &partition.test)?;
        let train_x = FeatureMatrix::from_frame(&train)?;
        let test_x = FeatureMatrix::from_frame(&test)?;
        if train_x.columns() != test_x.columns() {
            return Err(DataError::InvalidData(format!(
                "train and test features differ after transform for cut year {}",
                window.cut_year
            ))
            .into());
        }
        debug!("{} features after transform", train_x.n_cols());

        let mut table = ResultsTable::new(self.config.table_columns())?;
        let progress = self.progress_bar(n_models);

        for (row, instance) in self.factory.expand(model_config)?.enumerate() {
            let mut instance = instance?;
            let signature = instance.signature();
            let model_error = |source: ModelError| PipelineError::Model {
                family: instance.family.clone(),
                signature: signature.clone(),
                cut_year: window.cut_year,
                source,
            };
            progress.set_message(signature.clone());

            enter(PipelineStage::FittingModel, window.index);
            instance
                .classifier
                .fit(&train_x, &partition.train_labels)
                .map_err(model_error)?;

            enter(PipelineStage::Scoring, window.index);
            let scores = instance.classifier.score(&test_x).map_err(model_error)?;
            debug!("{} produced {:?} scores", signature, instance.classifier.score_kind());

            enter(PipelineStage::Accumulating, window.index);
            let score_row =
                calculator.score_row(&instance.family, &signature, &partition.test_labels, &scores)?;
            sink.record(&instance.family, window.index, row, &partition.test_labels, &scores)?;
            info!("Partition {} {}", window.index, score_row.summary());
            table.push(score_row);

            // one fitted model in memory at a time
            drop(instance);
            progress.inc(1);
        }
        progress.finish_and_clear();

        Ok(table)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classifier, ModelRegistry, ScoreKind};
    use polars::prelude::*;

    /// Scores every row by its first feature.
    struct FirstFeature {
        fitted: bool,
    }

    impl Classifier for FirstFeature {
        fn fit(&mut self, _: &FeatureMatrix, _: &[u8]) -> Result<(), ModelError> {
            self.fitted = true;
            Ok(())
        }

        fn score(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
            Ok(x.rows().map(|row| row[0]).collect())
        }

        fn score_kind(&self) -> ScoreKind {
            ScoreKind::DecisionFunction
        }

        fn is_fitted(&self) -> bool {
            self.fitted
        }
    }

    struct AlwaysFails;

    impl Classifier for AlwaysFails {
        fn fit(&mut self, _: &FeatureMatrix, _: &[u8]) -> Result<(), ModelError> {
            Err(ModelError::FitFailed("diverged".to_string()))
        }

        fn score(&self, _: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
            Err(ModelError::NotFitted)
        }

        fn score_kind(&self) -> ScoreKind {
            ScoreKind::Probability
        }

        fn is_fitted(&self) -> bool {
            false
        }
    }

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::empty();
        registry.register_fixed("FirstFeature", || Box::new(FirstFeature { fitted: false }));
        registry.register_fixed("AlwaysFails", || Box::new(AlwaysFails));
        registry
    }

    fn dataset() -> Dataset {
        let mut years = Vec::new();
        let mut signal = Vec::new();
        let mut labels = Vec::new();
        for year in 2006..=2017i64 {
            for i in 0..10 {
                years.push(year);
                signal.push(i as f64);
                labels.push(i64::from(i >= 8));
            }
        }
        let frame = df!("year" => years, "signal" => signal, "label" => labels).unwrap();
        Dataset::new(frame, ColumnRoles::new(vec!["signal".to_string()], "label", "year")).unwrap()
    }

    fn config(out_path: &str, models: &str) -> PipelineConfig {
        let text = format!(
            r#"
[io]
input_path = "unused.csv"

[cols]
x_cols = ["signal"]
y_col = "label"

[time]
start_year = 2006
end_year = 2017

{}

[matrix]
out_path = "{}"
percentage = 20.0
"#,
            models, out_path
        );
        PipelineConfig::from_toml_str(&text).unwrap()
    }

    #[test]
    fn test_one_table_per_partition() {
        let dir = tempfile::tempdir().unwrap();
        let out = format!("{}/results_", dir.path().display());
        let runner = PipelineRunner::with_factory(
            config(&out, "[models.FirstFeature]"),
            ModelFactory::new(registry()),
        );

        let report = runner.run_dataset(&dataset()).unwrap();
        assert_eq!(report.tables.len(), 4);
        assert_eq!(report.tables[0], PathBuf::from(format!("{}1.csv", out)));
        assert!(report.tables.iter().all(|p| p.exists()));
        assert!(report.summary_path.exists());

        let cuts: Vec<i32> = report.summary.partitions.iter().map(|p| p.cut_year).collect();
        assert_eq!(cuts, vec![2007, 2009, 2011, 2013]);

        // top 20% of each test set is exactly the positive rows
        let best = report.summary.partitions[0].best.as_ref().unwrap();
        assert_eq!(best.family, "FirstFeature");
        assert_eq!(best.value, 1.0);
        assert_eq!(report.summary.partitions[0].test_rows, 20);
        assert_eq!(report.summary.partitions[0].train_rows, 20);
    }

    #[test]
    fn test_model_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let out = format!("{}/results_", dir.path().display());
        let runner = PipelineRunner::with_factory(
            config(&out, "[models.FirstFeature]\n\n[models.AlwaysFails]"),
            ModelFactory::new(registry()),
        );

        let err = runner.run_dataset(&dataset()).unwrap_err();
        match err {
            PipelineError::Model {
                family, cut_year, ..
            } => {
                assert_eq!(family, "AlwaysFails");
                assert_eq!(cut_year, 2007);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!PathBuf::from(format!("{}1.csv", out)).exists());
    }

    #[test]
    fn test_unknown_family_before_any_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = format!("{}/results_", dir.path().display());
        let runner = PipelineRunner::with_factory(
            config(&out, "[models.FirstFeature]"),
            ModelFactory::new(ModelRegistry::empty()),
        );
        assert!(matches!(
            runner.run_dataset(&dataset()),
            Err(PipelineError::Config(ConfigError::UnknownFamily(name))) if name == "FirstFeature"
        ));
        assert!(!runner.summary_path().exists());
    }

    #[test]
    fn test_short_domain_produces_no_tables() {
        let dir = tempfile::tempdir().unwrap();
        let out = format!("{}/results_", dir.path().display());
        let mut cfg = config(&out, "[models.FirstFeature]");
        cfg.time.end_year = 2009;
        let runner = PipelineRunner::with_factory(cfg, ModelFactory::new(registry()));

        let report = runner.run_dataset(&dataset()).unwrap();
        assert!(report.tables.is_empty());
        assert!(report.summary.partitions.is_empty());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::FittingModel.to_string(), "fitting_model");
        assert_eq!(PipelineStage::Done.name(), "done");
    }
}
