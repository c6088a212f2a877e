//! Lazy temporal train/test splitting.

use tracing::info;

use crate::data::{DataError, Dataset, Partition};

use super::periods::{SplitSpec, Windows};

/// Single forward pass over the partitions of a dataset.
///
/// Each partition is materialized only when requested. Create a new
/// splitter to start over.
pub struct TemporalSplitter<'a> {
    dataset: &'a Dataset,
    windows: Windows,
    total: usize,
}

impl<'a> TemporalSplitter<'a> {
    pub fn new(dataset: &'a Dataset, spec: &SplitSpec) -> Self {
        Self {
            dataset,
            windows: spec.windows(),
            total: spec.expected_windows(),
        }
    }

    /// Number of partitions the full pass yields.
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for TemporalSplitter<'_> {
    type Item = Result<Partition, DataError>;

    fn next(&mut self) -> Option<Self::Item> {
        let window = self.windows.next()?;
        info!(
            "Splitting partition {}/{}: train <= {}, test {}..={}",
            window.index, self.total, window.cut_year, window.test_start, window.test_end
        );
        Some(self.dataset.partition(&window))
    }
}

/// Split `dataset` into its rolling-origin partitions.
pub fn split<'a>(dataset: &'a Dataset, spec: &SplitSpec) -> TemporalSplitter<'a> {
    TemporalSplitter::new(dataset, spec)
}
