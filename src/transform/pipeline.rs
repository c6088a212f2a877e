//! Train-fitted feature engineering applied to one partition.

use polars::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::config::TransformConfig;

use super::dummies::DummyEncoding;
use super::imputer::{fill_categorical, RegionalMeanImputer};
use super::scaler::MinMaxBounds;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Column {0} is not numeric")]
    NonNumericColumn(String),
}

pub(crate) fn column<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a Column, TransformError> {
    frame
        .column(name)
        .map_err(|_| TransformError::MissingColumn(name.to_string()))
}

fn drop_if_present(frame: &DataFrame, name: &str) -> Result<DataFrame, TransformError> {
    if frame.get_column_names().iter().any(|c| c.as_str() == name) {
        Ok(frame.drop(name)?)
    } else {
        Ok(frame.clone())
    }
}

/// Fits on train and applies the same fitted parameters to both frames.
///
/// Test rows never influence the fitted parameters.
pub trait FeatureTransform {
    fn fit_apply(
        &self,
        train: &DataFrame,
        test: &DataFrame,
    ) -> Result<(DataFrame, DataFrame), TransformError>;
}

/// Only removes the time column.
#[derive(Debug, Clone)]
pub struct PassthroughTransform {
    time_col: String,
}

impl PassthroughTransform {
    pub fn new(time_col: &str) -> Self {
        Self {
            time_col: time_col.to_string(),
        }
    }
}

impl FeatureTransform for PassthroughTransform {
    fn fit_apply(
        &self,
        train: &DataFrame,
        test: &DataFrame,
    ) -> Result<(DataFrame, DataFrame), TransformError> {
        Ok((
            drop_if_present(train, &self.time_col)?,
            drop_if_present(test, &self.time_col)?,
        ))
    }
}

/// Categorical fill, regional-mean imputation, time column removal, min-max
/// scaling and dummy encoding, in that order.
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    config: TransformConfig,
    imputer: RegionalMeanImputer,
    time_col: String,
}

impl TransformPipeline {
    pub fn new(config: &TransformConfig, time_col: &str) -> Self {
        Self {
            config: config.clone(),
            imputer: RegionalMeanImputer::new(&config.imputation),
            time_col: time_col.to_string(),
        }
    }

    fn categorical(&self) -> &[String] {
        &self.config.imputation.cols
    }
}

impl FeatureTransform for TransformPipeline {
    fn fit_apply(
        &self,
        train: &DataFrame,
        test: &DataFrame,
    ) -> Result<(DataFrame, DataFrame), TransformError> {
        let train = fill_categorical(train, self.categorical())?;
        let test = fill_categorical(test, self.categorical())?;

        let means = self.imputer.fit(&train)?;
        let train = means.apply(&train, 0)?;
        let test = means.apply(&test, self.imputer.lookup_lag_years())?;
        debug!("Imputed {} columns from train means", means.columns().len());

        let train = drop_if_present(&train, &self.time_col)?;
        let test = drop_if_present(&test, &self.time_col)?;

        let continuous: Vec<String> = train
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .filter(|name| !self.categorical().contains(name))
            .collect();
        let bounds = MinMaxBounds::fit(&train, &continuous)?;
        let mut train = bounds.apply(&train)?;
        let mut test = bounds.apply(&test)?;

        if let Some(dummy) = &self.config.dummy {
            for name in &dummy.cols {
                let encoding = DummyEncoding::fit(&train, name, dummy.k)?;
                debug!(
                    "Encoding {} as {} indicators{}",
                    name,
                    encoding.categories().len(),
                    if encoding.is_capped() { " plus others" } else { "" }
                );
                train = encoding.apply(&train)?;
                test = encoding.apply(&test)?;
            }
        }

        Ok((train, test))
    }
}

/// The configured transform, or a pass-through when none is configured.
pub fn from_config(config: Option<&TransformConfig>, time_col: &str) -> Box<dyn FeatureTransform> {
    match config {
        Some(config) => Box::new(TransformPipeline::new(config, time_col)),
        None => Box::new(PassthroughTransform::new(time_col)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DummyConfig, ImputationConfig};
    use approx::assert_relative_eq;

    fn config(k: usize) -> TransformConfig {
        TransformConfig {
            imputation: ImputationConfig {
                cols: vec!["kind".to_string()],
                loc_col: "area".to_string(),
                time_col: "year".to_string(),
                lookup_lag_years: 4,
            },
            dummy: Some(DummyConfig {
                cols: vec!["kind".to_string()],
                k,
            }),
        }
    }

    fn frames() -> (DataFrame, DataFrame) {
        let train = df!(
            "area" => [1i64, 1, 2, 2],
            "year" => [2008i32, 2008, 2008, 2009],
            "income" => [Some(2.0), None, Some(6.0), Some(10.0)],
            "kind" => [Some("a"), Some("a"), None, Some("b")]
        )
        .unwrap();
        let test = df!(
            "area" => [1i64, 2],
            "year" => [2012i32, 2013],
            "income" => [None, Some(14.0)],
            "kind" => [Some("c"), None::<&str>]
        )
        .unwrap();
        (train, test)
    }

    fn values(frame: &DataFrame, name: &str) -> Vec<f64> {
        frame
            .column(name)
            .unwrap()
            .cast(&DataType::Float64)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect()
    }

    #[test]
    fn test_passthrough_drops_time() {
        let (train, test) = frames();
        let (train, test) = PassthroughTransform::new("year").fit_apply(&train, &test).unwrap();
        assert!(train.column("year").is_err());
        assert!(test.column("year").is_err());
        assert_eq!(train.width(), 3);
    }

    #[test]
    fn test_full_pipeline() {
        let (train, test) = frames();
        let (train, test) = TransformPipeline::new(&config(10), "year")
            .fit_apply(&train, &test)
            .unwrap();

        assert!(train.column("year").is_err());
        assert!(train.column("kind").is_err());
        // train categories: a (2), b (1), unknown (1)
        let mut names: Vec<String> = train.get_column_names().iter().map(|c| c.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["area", "income", "kind_a", "kind_b", "kind_unknown"]);
        assert_eq!(test.width(), train.width());

        // (area 1, 2008) mean is 2.0; scaled with train bounds [2, 10]
        assert_eq!(values(&train, "income"), vec![0.0, 0.0, 0.5, 1.0]);
        // test (area 1, 2012) looks up 2008; 14.0 is beyond the train max
        let income = values(&test, "income");
        assert_relative_eq!(income[0], 0.0);
        assert_relative_eq!(income[1], 1.5);

        assert_eq!(values(&test, "kind_unknown"), vec![0.0, 1.0]);
        assert_eq!(values(&test, "kind_a"), vec![0.0, 0.0]);
        assert_eq!(values(&train, "area"), vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_capped_dummies() {
        let (train, test) = frames();
        let (train, test) = TransformPipeline::new(&config(1), "year")
            .fit_apply(&train, &test)
            .unwrap();
        assert_eq!(values(&train, "kind_a"), vec![1.0, 1.0, 0.0, 0.0]);
        assert_eq!(values(&train, "kind_others"), vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(values(&test, "kind_others"), vec![1.0, 1.0]);
    }

    #[test]
    fn test_train_statistics_only() {
        let (train, test) = frames();
        let mut outlier_test = test.clone();
        outlier_test
            .with_column(Series::new("income".into(), [Some(1000.0), None]))
            .unwrap();

        let pipeline = TransformPipeline::new(&config(10), "year");
        let (train_a, _) = pipeline.fit_apply(&train, &test).unwrap();
        let (train_b, test_b) = pipeline.fit_apply(&train, &outlier_test).unwrap();
        assert!(train_a.equals(&train_b));
        // (area 2, 2013) looks up the (area 2, 2009) train mean
        assert_relative_eq!(values(&test_b, "income")[1], 1.0);
    }

    #[test]
    fn test_from_config() {
        let (train, test) = frames();
        let transform = from_config(None, "year");
        let (train, _) = transform.fit_apply(&train, &test).unwrap();
        assert!(train.column("kind").is_ok());
    }
}
