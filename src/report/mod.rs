//! Result persistence: per-partition tables, curve files and the run summary.

pub mod sink;
pub mod summary;
pub mod table;

pub use sink::{CsvCurveSink, CurveSink, NullCurveSink};
pub use summary::{BestModel, PartitionSummary, RunSummary};
pub use table::{ReportError, ResultsTable};
