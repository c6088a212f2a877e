//! Dense numeric views of polars frames for model fitting.

use polars::prelude::*;

use super::types::DataError;

/// Row-major dense feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    n_rows: usize,
    values: Vec<f64>,
}

impl FeatureMatrix {
    /// Build from row-major values.
    pub fn new(columns: Vec<String>, n_rows: usize, values: Vec<f64>) -> Result<Self, DataError> {
        if values.len() != n_rows * columns.len() {
            return Err(DataError::InvalidData(format!(
                "expected {} values for {} rows x {} columns, got {}",
                n_rows * columns.len(),
                n_rows,
                columns.len(),
                values.len()
            )));
        }
        Ok(Self {
            columns,
            n_rows,
            values,
        })
    }

    /// Build from a slice of equally sized rows.
    pub fn from_rows(columns: Vec<String>, rows: &[Vec<f64>]) -> Result<Self, DataError> {
        let values: Vec<f64> = rows.iter().flatten().copied().collect();
        Self::new(columns, rows.len(), values)
    }

    /// Convert every column of `frame` into `f64`.
    ///
    /// String columns and nulls are rejected: the transform step must have
    /// encoded and imputed them already.
    pub fn from_frame(frame: &DataFrame) -> Result<Self, DataError> {
        let n_rows = frame.height();
        let columns: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let n_cols = columns.len();

        let mut values = vec![0.0; n_rows * n_cols];
        for (j, name) in columns.iter().enumerate() {
            let column = frame.column(name)?;
            if matches!(column.dtype(), DataType::String) {
                return Err(DataError::NonNumericFeature(name.clone()));
            }
            if column.null_count() > 0 {
                return Err(DataError::NullValues {
                    column: name.clone(),
                    count: column.null_count(),
                });
            }

            let cast = column.cast(&DataType::Float64)?;
            for (i, value) in cast.f64()?.into_iter().enumerate() {
                values[i * n_cols + j] = value.unwrap_or(f64::NAN);
            }
        }

        Self::new(columns, n_rows, values)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        let n_cols = self.columns.len();
        &self.values[i * n_cols..(i + 1) * n_cols]
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.columns.len() + j]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.n_rows).map(move |i| self.row(i))
    }
}

/// Read a 0/1 label column.
pub fn extract_labels(frame: &DataFrame, column: &str) -> Result<Vec<u8>, DataError> {
    let series = frame
        .column(column)
        .map_err(|_| DataError::MissingColumn(column.to_string()))?;
    if series.null_count() > 0 {
        return Err(DataError::NullValues {
            column: column.to_string(),
            count: series.null_count(),
        });
    }

    let cast = series.cast(&DataType::Float64)?;
    cast.f64()?
        .into_iter()
        .map(|value| match value {
            Some(v) if v == 0.0 => Ok(0),
            Some(v) if v == 1.0 => Ok(1),
            Some(v) => Err(DataError::NonBinaryLabel {
                column: column.to_string(),
                value: v,
            }),
            None => Err(DataError::NullValues {
                column: column.to_string(),
                count: 1,
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_frame_row_major() {
        let frame = DataFrame::new(vec![
            Series::new("a".into(), vec![1i64, 2, 3]).into(),
            Series::new("b".into(), vec![0.5, 1.5, 2.5]).into(),
        ])
        .unwrap();

        let matrix = FeatureMatrix::from_frame(&frame).unwrap();
        assert_eq!(matrix.n_rows(), 3);
        assert_eq!(matrix.n_cols(), 2);
        assert_eq!(matrix.row(1), &[2.0, 1.5]);
        assert_eq!(matrix.get(2, 1), 2.5);
        assert_eq!(matrix.columns(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_from_frame_rejects_strings() {
        let frame = DataFrame::new(vec![Series::new("district".into(), vec!["n", "s"]).into()]).unwrap();
        assert!(matches!(
            FeatureMatrix::from_frame(&frame),
            Err(DataError::NonNumericFeature(c)) if c == "district"
        ));
    }

    #[test]
    fn test_from_frame_rejects_nulls() {
        let frame =
            DataFrame::new(vec![Series::new("x".into(), vec![Some(1.0), None]).into()]).unwrap();
        assert!(matches!(
            FeatureMatrix::from_frame(&frame),
            Err(DataError::NullValues { count: 1, .. })
        ));
    }

    #[test]
    fn test_new_checks_shape() {
        assert!(FeatureMatrix::new(vec!["x".to_string()], 2, vec![1.0]).is_err());
        let m = FeatureMatrix::from_rows(
            vec!["x".to_string(), "y".to_string()],
            &[vec![1.0, 2.0], vec![3.0, 4.0]],
        )
        .unwrap();
        assert_eq!(m.rows().count(), 2);
    }

    #[test]
    fn test_extract_labels() {
        let frame = DataFrame::new(vec![
            Series::new("y".into(), vec![0i64, 1, 1]).into(),
            Series::new("bad".into(), vec![0.0, 0.5, 1.0]).into(),
        ])
        .unwrap();
        assert_eq!(extract_labels(&frame, "y").unwrap(), vec![0, 1, 1]);
        assert!(matches!(
            extract_labels(&frame, "bad"),
            Err(DataError::NonBinaryLabel { value, .. }) if value == 0.5
        ));
        assert!(matches!(
            extract_labels(&frame, "missing"),
            Err(DataError::MissingColumn(_))
        ));
    }
}
