use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{unknown_columns, StagingSink};
use crate::constants::DEFAULT_STAGING_TABLE;
use crate::dataset::{Dataset, Value};
use crate::error::{EtlError, Result};

/// In-memory staging table for development/testing.
///
/// Clones share the same table, so a test can hand one clone to the runner
/// and inspect the other.
#[derive(Debug, Clone)]
pub struct InMemoryStagingSink {
    table: String,
    contents: Arc<Mutex<Option<Dataset>>>,
}

impl Default for InMemoryStagingSink {
    fn default() -> Self {
        Self::new(DEFAULT_STAGING_TABLE)
    }
}

impl InMemoryStagingSink {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            contents: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, Option<Dataset>>, String> {
        self.contents
            .lock()
            .map_err(|_| "staging table lock poisoned".to_string())
    }
}

impl StagingSink for InMemoryStagingSink {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn append(&self, dataset: &Dataset) -> Result<usize> {
        if dataset.is_empty() {
            return Ok(0);
        }
        let append_error = |message: String| EtlError::StagingAppend {
            table: self.table.clone(),
            message,
        };

        let mut guard = self.lock().map_err(append_error)?;
        let table = guard.get_or_insert_with(|| dataset.empty_like());

        let unknown = unknown_columns(dataset.columns(), table.columns());
        if !unknown.is_empty() {
            return Err(append_error(format!(
                "columns {unknown:?} do not exist in the staging table"
            )));
        }

        // Columns the incoming dataset lacks are stored as missing
        let positions: Vec<Option<usize>> = table
            .columns()
            .iter()
            .map(|name| dataset.column_index(name))
            .collect();
        for row in dataset.rows() {
            let aligned = positions
                .iter()
                .map(|pos| {
                    pos.and_then(|idx| row.get(idx).cloned())
                        .unwrap_or(Value::Missing)
                })
                .collect();
            table.push_row(aligned)?;
        }

        debug!("Appended {} rows to {}", dataset.row_count(), self.table);
        Ok(dataset.row_count())
    }

    fn read_all(&self) -> Result<Dataset> {
        let guard = self.lock().map_err(|message| EtlError::StagingRead {
            table: self.table.clone(),
            message,
        })?;
        Ok(guard.clone().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(columns: &[&str], rows: Vec<Vec<Value>>) -> Dataset {
        Dataset::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn test_read_before_first_append_is_empty() {
        let sink = InMemoryStagingSink::default();
        let snapshot = sink.read_all().unwrap();
        assert_eq!(snapshot.column_count(), 0);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_appends_accumulate_in_order() {
        let sink = InMemoryStagingSink::new("t");
        let first = dataset(&["id", "value"], vec![vec![Value::Integer(1), Value::Float(2.0)]]);
        let second = dataset(&["id", "value"], vec![vec![Value::Integer(2), Value::Float(4.0)]]);
        assert_eq!(sink.append(&first).unwrap(), 1);
        assert_eq!(sink.append(&second).unwrap(), 1);

        let snapshot = sink.read_all().unwrap();
        assert_eq!(snapshot.row_count(), 2);
        assert_eq!(snapshot.rows()[1][0], Value::Integer(2));
    }

    #[test]
    fn test_clones_share_the_table() {
        let sink = InMemoryStagingSink::default();
        let observer = sink.clone();
        sink.append(&dataset(&["value"], vec![vec![Value::Float(1.0)]]))
            .unwrap();
        assert_eq!(observer.read_all().unwrap().row_count(), 1);
    }

    #[test]
    fn test_empty_append_does_not_create_table() {
        let sink = InMemoryStagingSink::default();
        assert_eq!(sink.append(&dataset(&["value"], vec![])).unwrap(), 0);
        assert_eq!(sink.read_all().unwrap().column_count(), 0);
    }

    #[test]
    fn test_unknown_columns_are_rejected() {
        let sink = InMemoryStagingSink::default();
        sink.append(&dataset(&["value"], vec![vec![Value::Float(1.0)]]))
            .unwrap();
        let err = sink
            .append(&dataset(&["value", "extra"], vec![vec![Value::Float(1.0), Value::Missing]]))
            .unwrap_err();
        assert!(matches!(err, EtlError::StagingAppend { .. }));
        assert_eq!(sink.read_all().unwrap().row_count(), 1);
    }

    #[test]
    fn test_missing_columns_are_stored_as_missing() {
        let sink = InMemoryStagingSink::default();
        sink.append(&dataset(&["id", "value"], vec![vec![Value::Integer(1), Value::Float(1.0)]]))
            .unwrap();
        sink.append(&dataset(&["value"], vec![vec![Value::Float(3.0)]]))
            .unwrap();
        let snapshot = sink.read_all().unwrap();
        assert!(snapshot.rows()[1][0].is_missing());
        assert_eq!(snapshot.rows()[1][1], Value::Float(3.0));
    }
}
