use std::collections::HashSet;
use tracing::{debug, info};

use crate::constants::VALUE_COLUMN;
use crate::dataset::{Dataset, Value};
use crate::error::{EtlError, Result};
use crate::pipeline::stats::StatsAccumulator;

/// Removes duplicate rows and repairs the numeric column.
#[derive(Debug, Clone)]
pub struct Cleaner {
    value_column: String,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl Cleaner {
    pub fn new() -> Self {
        Self {
            value_column: VALUE_COLUMN.to_string(),
        }
    }

    /// Produce a cleaned copy of a normalized dataset.
    ///
    /// Steps, in order: exact-row deduplication keeping first occurrences,
    /// data quality from the surviving row count, then coercion of the value
    /// column where every missing or non-numeric entry becomes zero. Counts
    /// are written into `stats`; `dataset` is left untouched.
    ///
    /// `nans_filled` counts the value entries of the deduplicated rows, so a
    /// missing value inside a dropped duplicate is not counted.
    ///
    /// Fails with [`EtlError::SchemaPrecondition`] before touching any row
    /// when the value column is absent.
    pub fn clean(
        &self,
        dataset: &Dataset,
        stats: &mut StatsAccumulator,
        records_processed: usize,
    ) -> Result<Dataset> {
        let value_idx = dataset
            .column_index(&self.value_column)
            .ok_or_else(|| EtlError::SchemaPrecondition {
                column: self.value_column.clone(),
            })?;

        debug!("Dropping duplicate rows...");
        let kept = drop_duplicates(dataset.rows());
        let duplicates_dropped = dataset.row_count() - kept.len();
        stats.record_duplicates_dropped(duplicates_dropped);
        stats.record_data_quality(kept.len(), records_processed);

        debug!("Handling missing values...");
        let (rows, nans_filled) = repair_numeric_column(kept, value_idx);
        stats.record_nans_filled(nans_filled);

        info!(
            duplicates_dropped,
            nans_filled,
            rows = rows.len(),
            "Cleaned dataset"
        );
        Dataset::from_rows(dataset.columns().to_vec(), rows)
    }
}

/// Keep the first occurrence of every distinct row, preserving row order.
fn drop_duplicates(rows: &[Vec<Value>]) -> Vec<Vec<Value>> {
    let mut seen: HashSet<&[Value]> = HashSet::with_capacity(rows.len());
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        if seen.insert(row.as_slice()) {
            kept.push(row.clone());
        }
    }
    kept
}

fn coerce_numeric(cell: &Value) -> Option<Value> {
    match cell {
        v if v.is_missing() => None,
        Value::Integer(i) => Some(Value::Integer(*i)),
        Value::Float(f) => Some(Value::Float(*f)),
        Value::Text(s) => Value::parse_numeric(s),
        Value::Missing => None,
    }
}

/// Coerce the column at `idx` to numbers, replacing every unusable entry with
/// zero. The column stays integer only when nothing needed repair and every
/// entry was an integer; otherwise it is widened to float.
fn repair_numeric_column(mut rows: Vec<Vec<Value>>, idx: usize) -> (Vec<Vec<Value>>, usize) {
    let coerced: Vec<Option<Value>> = rows
        .iter()
        .map(|row| row.get(idx).and_then(coerce_numeric))
        .collect();
    let nans_filled = coerced.iter().filter(|v| v.is_none()).count();
    let all_integer = coerced
        .iter()
        .all(|v| matches!(v, Some(Value::Integer(_))));

    for (row, value) in rows.iter_mut().zip(coerced) {
        let repaired = match value {
            Some(Value::Integer(i)) if all_integer => Value::Integer(i),
            Some(v) => Value::Float(v.as_f64().unwrap_or(0.0)),
            None => Value::Float(0.0),
        };
        if let Some(cell) = row.get_mut(idx) {
            *cell = repaired;
        }
    }
    (rows, nans_filled)
}
