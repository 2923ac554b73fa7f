// Staging destinations for transformed datasets

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStagingSink;
pub use sqlite::SqliteStagingSink;

use crate::dataset::Dataset;
use crate::error::Result;

/// Append-only table that receives every run's transformed dataset.
///
/// Rows are only ever added, keyed by insertion order. The table is created on
/// the first append that carries rows and keeps that schema afterwards.
pub trait StagingSink: Send + Sync {
    fn table_name(&self) -> &str;

    /// Append all rows of `dataset`, returning how many were written.
    /// A dataset without rows is a no-op.
    fn append(&self, dataset: &Dataset) -> Result<usize>;

    /// Current contents in insertion order, or an empty dataset when the
    /// table has not been created yet.
    fn read_all(&self) -> Result<Dataset>;
}

/// Columns of `incoming` that the existing table does not have
pub(crate) fn unknown_columns<'a>(incoming: &'a [String], existing: &[String]) -> Vec<&'a str> {
    incoming
        .iter()
        .filter(|name| !existing.contains(*name))
        .map(String::as_str)
        .collect()
}
