use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::dataset::{csv_io, Dataset};
use crate::error::{EtlError, Result};
use crate::pipeline::processing::{Cleaner, ColumnNormalizer, ValueScaler};
use crate::pipeline::stats::{StatsAccumulator, StatsRecord};
use crate::pipeline::storage::{SqliteStagingSink, StagingSink};

/// What happened to the transformed dataset at the staging table
#[derive(Debug)]
pub enum StagingStatus {
    Appended { rows: usize },
    /// The run succeeded but persistence did not; in-memory results stay valid.
    Failed(EtlError),
}

impl StagingStatus {
    pub fn is_appended(&self) -> bool {
        matches!(self, StagingStatus::Appended { .. })
    }

    pub fn error(&self) -> Option<&EtlError> {
        match self {
            StagingStatus::Failed(e) => Some(e),
            StagingStatus::Appended { .. } => None,
        }
    }
}

/// Result of a complete pipeline run
#[derive(Debug)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    /// Dataset as read from the source, before normalization
    pub original: Dataset,
    pub transformed: Dataset,
    pub stats: StatsRecord,
    pub staging: StagingStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineOutcome {
    /// The `(original, transformed, stats)` triple handed to presentation layers
    pub fn into_parts(self) -> (Dataset, Dataset, StatsRecord) {
        (self.original, self.transformed, self.stats)
    }
}

/// Orchestrates extract -> normalize -> clean -> transform -> load.
pub struct PipelineRunner {
    default_source: PathBuf,
    normalizer: ColumnNormalizer,
    cleaner: Cleaner,
    scaler: ValueScaler,
    sink: Arc<dyn StagingSink>,
}

impl PipelineRunner {
    pub fn new(default_source: impl Into<PathBuf>, sink: Arc<dyn StagingSink>) -> Self {
        Self {
            default_source: default_source.into(),
            normalizer: ColumnNormalizer::new(),
            cleaner: Cleaner::new(),
            scaler: ValueScaler::new(),
            sink,
        }
    }

    /// Runner backed by the SQLite staging table named in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let sink = SqliteStagingSink::open(&config.staging.db_path, &config.staging.table)?;
        Ok(Self::new(config.input_path.clone(), Arc::new(sink)))
    }

    pub fn sink(&self) -> &dyn StagingSink {
        self.sink.as_ref()
    }

    /// Run the pipeline against `source`, or the default source when `None`.
    ///
    /// Load failures abort before any statistics exist. A staging failure does
    /// not: it is reported through [`PipelineOutcome::staging`].
    #[instrument(skip(self, source))]
    pub fn run(&self, source: Option<&Path>) -> Result<PipelineOutcome> {
        let path = source.unwrap_or(self.default_source.as_path());
        info!("📥 Reading data from {}...", path.display());
        let original = csv_io::read_csv(path)?;
        self.run_dataset(original)
    }

    /// Run the pipeline on a dataset that is already in memory.
    pub fn run_dataset(&self, original: Dataset) -> Result<PipelineOutcome> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id, table = self.sink.table_name());
        let _enter = span.enter();

        let started_at = Utc::now();
        let timer = Instant::now();
        counter!("etl_pipeline_runs_total").increment(1);

        let records_processed = original.row_count();
        let mut stats = StatsAccumulator::new(records_processed);
        info!("🚀 Starting pipeline for {} records", records_processed);

        debug!("Standardizing column names...");
        let normalized = self.normalizer.normalize(&original)?;

        debug!("Cleaning data...");
        let cleaned = self
            .cleaner
            .clean(&normalized, &mut stats, records_processed)?;

        debug!("Transforming data...");
        let transformed = self.scaler.apply(cleaned);
        let stats = stats.finalize();

        counter!("etl_records_processed_total").increment(stats.records_processed as u64);
        counter!("etl_duplicates_dropped_total").increment(stats.duplicates_dropped as u64);
        counter!("etl_nans_filled_total").increment(stats.nans_filled as u64);

        let staging = match self.sink.append(&transformed) {
            Ok(rows) => StagingStatus::Appended { rows },
            Err(e) => {
                warn!("Staging append failed: {}", e);
                counter!("etl_staging_append_failures_total").increment(1);
                StagingStatus::Failed(e)
            }
        };

        histogram!("etl_pipeline_duration_seconds").record(timer.elapsed().as_secs_f64());
        info!(
            records_processed = stats.records_processed,
            duplicates_dropped = stats.duplicates_dropped,
            nans_filled = stats.nans_filled,
            data_quality = stats.data_quality,
            transformations = stats.transformations,
            "✅ Pipeline finished"
        );

        Ok(PipelineOutcome {
            run_id,
            original,
            transformed,
            stats,
            staging,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Current contents of the staging table
    pub fn staging_snapshot(&self) -> Result<Dataset> {
        self.sink.read_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::csv_io::read_csv_from_reader;
    use crate::dataset::Value;
    use crate::pipeline::storage::InMemoryStagingSink;

    struct FailingSink;

    impl StagingSink for FailingSink {
        fn table_name(&self) -> &str {
            "broken"
        }

        fn append(&self, _dataset: &Dataset) -> Result<usize> {
            Err(EtlError::StagingAppend {
                table: "broken".to_string(),
                message: "disk full".to_string(),
            })
        }

        fn read_all(&self) -> Result<Dataset> {
            Ok(Dataset::default())
        }
    }

    fn load(text: &str) -> Dataset {
        read_csv_from_reader(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_run_dataset_reports_stats_and_appends() {
        let sink = InMemoryStagingSink::default();
        let runner = PipelineRunner::new("unused.csv", Arc::new(sink.clone()));

        let outcome = runner.run_dataset(load("ID,Value\n1,5\n2,\n1,5\n")).unwrap();

        assert_eq!(outcome.stats.records_processed, 3);
        assert_eq!(outcome.stats.duplicates_dropped, 1);
        assert_eq!(outcome.stats.nans_filled, 1);
        assert_eq!(outcome.stats.transformations, 2);
        assert!(matches!(outcome.staging, StagingStatus::Appended { rows: 2 }));
        assert_eq!(sink.read_all().unwrap(), outcome.transformed);
    }

    #[test]
    fn test_into_parts_returns_original_transformed_and_stats() {
        let runner = PipelineRunner::new("unused.csv", Arc::new(InMemoryStagingSink::default()));
        let outcome = runner.run_dataset(load("ID,Value\n1,5\n2,\n1,5\n")).unwrap();
        let expected_stats = outcome.stats.clone();

        let (original, transformed, stats) = outcome.into_parts();

        assert_eq!(original.row_count(), 3);
        assert_eq!(original.columns(), ["ID", "Value"]);
        assert_eq!(transformed.row_count(), 2);
        assert_eq!(transformed.columns(), ["id", "value"]);
        assert_eq!(stats, expected_stats);
        assert_eq!(stats.transformations, 2);
    }

    #[test]
    fn test_original_keeps_source_column_names() {
        let runner = PipelineRunner::new("unused.csv", Arc::new(InMemoryStagingSink::default()));
        let outcome = runner.run_dataset(load("ID,Value\n1,5\n")).unwrap();
        assert_eq!(outcome.original.columns(), ["ID", "Value"]);
        assert_eq!(outcome.transformed.columns(), ["id", "value"]);
        assert_eq!(outcome.transformed.rows()[0][1], Value::Integer(10));
    }

    #[test]
    fn test_staging_failure_keeps_results() {
        let runner = PipelineRunner::new("unused.csv", Arc::new(FailingSink));
        let outcome = runner.run_dataset(load("value\n1\n2\n")).unwrap();

        assert!(!outcome.staging.is_appended());
        assert!(matches!(
            outcome.staging.error(),
            Some(EtlError::StagingAppend { .. })
        ));
        assert_eq!(outcome.transformed.row_count(), 2);
        assert_eq!(outcome.stats.records_processed, 2);
    }

    #[test]
    fn test_missing_value_column_aborts_before_load() {
        let sink = InMemoryStagingSink::default();
        let runner = PipelineRunner::new("unused.csv", Arc::new(sink.clone()));
        let err = runner.run_dataset(load("id,amount\n1,2\n")).unwrap_err();
        assert!(matches!(err, EtlError::SchemaPrecondition { .. }));
        assert_eq!(sink.read_all().unwrap().column_count(), 0);
    }

    #[test]
    fn test_column_collision_aborts_run() {
        let runner = PipelineRunner::new("unused.csv", Arc::new(InMemoryStagingSink::default()));
        let err = runner.run_dataset(load("Value,value\n1,2\n")).unwrap_err();
        assert!(matches!(err, EtlError::ColumnCollision { .. }));
    }

    #[test]
    fn test_missing_default_source_is_a_load_error() {
        let runner = PipelineRunner::new(
            "no/such/input.csv",
            Arc::new(InMemoryStagingSink::default()),
        );
        let err = runner.run(None).unwrap_err();
        assert!(matches!(err, EtlError::SourceLoad { .. }));
        assert!(err.is_fatal());
    }
}
