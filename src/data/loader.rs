//! CSV loader for entity-year observation tables.
//!
//! The input is a single flat CSV with one row per entity-year and a header
//! row. Column roles (features, label, year) come from the pipeline config.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use super::types::{ColumnRoles, DataError, Dataset};

/// Rows sampled for schema inference.
const INFER_SCHEMA_ROWS: usize = 10_000;

/// CSV data loader.
pub struct DataLoader {
    path: PathBuf,
}

impl DataLoader {
    /// Create a loader for the given CSV file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file into a DataFrame.
    pub fn load_frame(&self) -> Result<DataFrame, DataError> {
        if !self.path.exists() {
            return Err(DataError::FileNotFound(self.path.display().to_string()));
        }

        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .try_into_reader_with_file_path(Some(self.path.clone()))?
            .finish()?;

        Ok(frame)
    }

    /// Read the file and validate it against the column roles.
    pub fn load_dataset(&self, roles: ColumnRoles) -> Result<Dataset, DataError> {
        let frame = self.load_frame()?;
        let raw_rows = frame.height();

        let dataset = Dataset::new(frame, roles)?;
        let dropped = raw_rows - dataset.height();
        if dropped > 0 {
            info!("Dropped {} rows with a null label", dropped);
        }
        info!(
            "Loaded {} rows from {}",
            dataset.height(),
            self.path.display()
        );

        Ok(dataset)
    }

    /// Column names in file order.
    pub fn column_names(&self) -> Result<Vec<String>, DataError> {
        Ok(self
            .load_frame()?
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect())
    }
}
