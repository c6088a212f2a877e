pub mod loader;
pub mod matrix;
pub mod types;

pub use loader::DataLoader;
pub use matrix::{extract_labels, FeatureMatrix};
pub use types::{ColumnRoles, DataError, Dataset, Partition};
