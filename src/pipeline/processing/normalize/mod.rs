use std::collections::HashMap;
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{EtlError, Result};

/// Rewrites column labels to their canonical form: lowercase, spaces as underscores.
#[derive(Debug, Default, Clone, Copy)]
pub struct ColumnNormalizer;

impl ColumnNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Canonical form of a single label
    pub fn normalize_name(name: &str) -> String {
        name.to_lowercase().replace(' ', "_")
    }

    /// Return a copy of `dataset` with canonical column labels. Row content and
    /// column order are untouched.
    ///
    /// Two labels that land on the same key are rejected with
    /// [`EtlError::ColumnCollision`] rather than silently merged.
    pub fn normalize(&self, dataset: &Dataset) -> Result<Dataset> {
        let normalized: Vec<String> = dataset
            .columns()
            .iter()
            .map(|name| Self::normalize_name(name))
            .collect();

        let mut sources: HashMap<&str, Vec<String>> = HashMap::new();
        for (original, canonical) in dataset.columns().iter().zip(&normalized) {
            sources
                .entry(canonical.as_str())
                .or_default()
                .push(original.clone());
        }
        if let Some(canonical) = normalized
            .iter()
            .find(|canonical| sources.get(canonical.as_str()).map_or(0, Vec::len) > 1)
        {
            let sources = sources.remove(canonical.as_str()).unwrap_or_default();
            return Err(EtlError::ColumnCollision {
                column: canonical.clone(),
                sources,
            });
        }

        debug!("Normalized columns: {:?}", normalized);
        dataset.clone().with_columns(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Value;

    fn dataset(columns: &[&str]) -> Dataset {
        let row = columns.iter().enumerate().map(|(i, _)| Value::Integer(i as i64)).collect();
        Dataset::from_rows(columns.iter().map(|c| c.to_string()).collect(), vec![row]).unwrap()
    }

    #[test]
    fn test_lowercases_and_replaces_spaces() {
        let out = ColumnNormalizer::new()
            .normalize(&dataset(&["ID", "Unit Price", "value"]))
            .unwrap();
        assert_eq!(out.columns(), ["id", "unit_price", "value"]);
    }

    #[test]
    fn test_row_content_is_unchanged() {
        let input = dataset(&["A B", "C"]);
        let out = ColumnNormalizer::new().normalize(&input).unwrap();
        assert_eq!(out.rows(), input.rows());
        assert_eq!(out.row_count(), input.row_count());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let normalizer = ColumnNormalizer::new();
        let once = normalizer.normalize(&dataset(&["First Name", "Value"])).unwrap();
        let twice = normalizer.normalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let input = dataset(&["Value"]);
        let _ = ColumnNormalizer::new().normalize(&input).unwrap();
        assert_eq!(input.columns(), ["Value"]);
    }

    #[test]
    fn test_colliding_labels_are_rejected() {
        let err = ColumnNormalizer::new()
            .normalize(&dataset(&["Value", "value", "id"]))
            .unwrap_err();
        match err {
            EtlError::ColumnCollision { column, sources } => {
                assert_eq!(column, "value");
                assert_eq!(sources, vec!["Value".to_string(), "value".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_trailing_space_does_not_collide() {
        let out = ColumnNormalizer::new()
            .normalize(&dataset(&["Value", "value "]))
            .unwrap();
        assert_eq!(out.columns(), ["value", "value_"]);
    }
}
