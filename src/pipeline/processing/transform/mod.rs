use tracing::debug;

use crate::constants::{VALUE_COLUMN, VALUE_SCALE_FACTOR};
use crate::dataset::{Dataset, Value};

/// Multiplies the value column by a fixed factor. Every other column passes through.
#[derive(Debug, Clone)]
pub struct ValueScaler {
    column: String,
    factor: i64,
}

impl Default for ValueScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueScaler {
    pub fn new() -> Self {
        Self {
            column: VALUE_COLUMN.to_string(),
            factor: VALUE_SCALE_FACTOR,
        }
    }

    pub fn factor(&self) -> i64 {
        self.factor
    }

    /// Scale a cleaned dataset. Integers use wrapping 64-bit arithmetic.
    /// A dataset without the column is returned unchanged.
    pub fn apply(&self, dataset: Dataset) -> Dataset {
        let Some(idx) = dataset.column_index(&self.column) else {
            return dataset;
        };
        debug!("Applying a basic transformation ({} * {})...", self.column, self.factor);

        let factor = self.factor;
        dataset.map_column(idx, |cell| match cell {
            Value::Integer(i) => Value::Integer(i.wrapping_mul(factor)),
            Value::Float(f) => Value::Float(f * factor as f64),
            other => other.clone(),
        })
    }
}
