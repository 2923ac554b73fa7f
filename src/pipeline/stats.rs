use serde::{Deserialize, Serialize};

/// Summary of one pipeline run. Frozen once the run returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    /// Row count at ingestion
    pub records_processed: usize,
    /// Rows removed by exact-row deduplication
    pub duplicates_dropped: usize,
    /// Missing or non-numeric `value` entries replaced by zero
    pub nans_filled: usize,
    /// Percentage of ingested rows kept after deduplication, two decimals
    pub data_quality: f64,
    /// `duplicates_dropped + nans_filled`
    pub transformations: usize,
}

/// Mutable ledger threaded through the cleaning stage of a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsAccumulator {
    records_processed: usize,
    duplicates_dropped: usize,
    nans_filled: usize,
    data_quality: f64,
}

impl StatsAccumulator {
    pub fn new(records_processed: usize) -> Self {
        Self {
            records_processed,
            duplicates_dropped: 0,
            nans_filled: 0,
            data_quality: 0.0,
        }
    }

    pub fn record_duplicates_dropped(&mut self, duplicates_dropped: usize) {
        self.duplicates_dropped = duplicates_dropped;
    }

    /// Percentage of `records_processed` still present after deduplication.
    /// Stays 0 when nothing was ingested.
    pub fn record_data_quality(&mut self, rows_remaining: usize, records_processed: usize) {
        self.data_quality = if records_processed == 0 {
            0.0
        } else {
            round2(rows_remaining as f64 / records_processed as f64 * 100.0)
        };
    }

    pub fn record_nans_filled(&mut self, nans_filled: usize) {
        self.nans_filled = nans_filled;
    }

    /// Freeze the ledger. Only repairs count as transformations; scaling does not.
    pub fn finalize(self) -> StatsRecord {
        StatsRecord {
            records_processed: self.records_processed,
            duplicates_dropped: self.duplicates_dropped,
            nans_filled: self.nans_filled,
            data_quality: self.data_quality,
            transformations: self.duplicates_dropped + self.nans_filled,
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ledger_is_zeroed() {
        let stats = StatsAccumulator::new(7).finalize();
        assert_eq!(stats.records_processed, 7);
        assert_eq!(stats.duplicates_dropped, 0);
        assert_eq!(stats.nans_filled, 0);
        assert_eq!(stats.transformations, 0);
        assert_eq!(stats.data_quality, 0.0);
    }

    #[test]
    fn test_data_quality_is_rounded_percentage() {
        let mut acc = StatsAccumulator::new(3);
        acc.record_duplicates_dropped(1);
        acc.record_data_quality(2, 3);
        assert_eq!(acc.finalize().data_quality, 66.67);
    }

    #[test]
    fn test_data_quality_is_zero_without_records() {
        let mut acc = StatsAccumulator::new(0);
        acc.record_data_quality(0, 0);
        assert_eq!(acc.finalize().data_quality, 0.0);
    }

    #[test]
    fn test_transformations_sum_repairs() {
        let mut acc = StatsAccumulator::new(10);
        acc.record_duplicates_dropped(3);
        acc.record_data_quality(7, 10);
        acc.record_nans_filled(4);
        let stats = acc.finalize();
        assert_eq!(stats.transformations, 7);
        assert_eq!(stats.data_quality, 70.0);
    }

    #[test]
    fn test_stats_serialize_with_field_names() {
        let stats = StatsAccumulator::new(1).finalize();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["records_processed"], 1);
        assert!(json.get("data_quality").is_some());
    }
}
