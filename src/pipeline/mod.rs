// Cleaning pipeline: processing stages, run statistics, staging storage

pub mod processing;
pub mod runner;
pub mod stats;
pub mod storage;

pub use runner::{PipelineOutcome, PipelineRunner, StagingStatus};
pub use stats::{StatsAccumulator, StatsRecord};
pub use storage::{InMemoryStagingSink, SqliteStagingSink, StagingSink};
