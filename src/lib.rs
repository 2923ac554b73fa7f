//! Batch ETL over a single CSV source.
//!
//! A run reads the source, normalizes column labels, drops duplicate rows,
//! repairs the `value` column, scales it and appends the result to a staging
//! table. See [`pipeline::PipelineRunner`].

pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use config::Config;
pub use dataset::{ColumnKind, Dataset, Value};
pub use error::{EtlError, Result};
pub use pipeline::{PipelineOutcome, PipelineRunner, StagingStatus, StatsRecord};
