use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use csv_staging_etl::dataset::{csv_io, ColumnKind, Dataset};
use csv_staging_etl::logging;
use csv_staging_etl::{Config, EtlError, PipelineOutcome, PipelineRunner, StatsRecord};

#[derive(Parser)]
#[command(name = "csv-staging-etl")]
#[command(about = "Clean, transform and stage a CSV dataset")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to ./etl.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once and print the results
    Run {
        /// Source CSV (overrides the configured input path)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Where to write the transformed CSV
        #[arg(long)]
        output: Option<PathBuf>,
        /// Skip writing the transformed CSV
        #[arg(long)]
        no_output: bool,
        /// Print a JSON report instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Show the current contents of the staging table
    Staging {
        /// Only show the first N rows
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Serialize)]
struct RunReport<'a> {
    run_id: String,
    original: &'a Dataset,
    original_kinds: Vec<(String, ColumnKind)>,
    transformed: &'a Dataset,
    transformed_kinds: Vec<(String, ColumnKind)>,
    stats: &'a StatsRecord,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    staging_error: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _guard = match logging::init_logging(&config.logging) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("⚠️  Logging disabled: {}", e);
            None
        }
    };

    match execute(cli.command, &config) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Commands, config: &Config) -> anyhow::Result<ExitCode> {
    let runner = PipelineRunner::from_config(config)?;

    match command {
        Commands::Run {
            input,
            output,
            no_output,
            json,
        } => {
            let source = input.unwrap_or_else(|| config.input_path.clone());
            if !csv_io::is_allowed_source(&source) {
                return Err(EtlError::source_load(
                    source.display().to_string(),
                    "only .csv sources are accepted",
                )
                .into());
            }

            let outcome = runner.run(Some(source.as_path()))?;
            if json {
                print_json(&outcome)?;
            } else {
                print_tables(&outcome);
            }

            if !no_output {
                let output = output.unwrap_or_else(|| config.output_path.clone());
                csv_io::write_csv(&outcome.transformed, &output)?;
                info!("💾 Transformed data written to {}", output.display());
                if !json {
                    println!("\n💾 Transformed data written to {}", output.display());
                }
            }

            match outcome.staging.error() {
                Some(e) => {
                    warn!("Run completed without staging: {}", e);
                    Ok(ExitCode::FAILURE)
                }
                None => Ok(ExitCode::SUCCESS),
            }
        }
        Commands::Staging { limit } => {
            let snapshot = runner.staging_snapshot()?;
            let total = snapshot.row_count();
            let shown = match limit {
                Some(n) => snapshot.head(n),
                None => snapshot,
            };
            println!(
                "🗄️  Staging table '{}' ({} rows):",
                runner.sink().table_name(),
                total
            );
            println!("{}", shown);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_tables(outcome: &PipelineOutcome) {
    println!("Original Data:");
    println!("{}", outcome.original);

    println!("\nOriginal Data Types:");
    for (name, kind) in outcome.original.column_kinds() {
        println!("{:<12} {}", name, kind);
    }

    println!("\nTransformed Data:");
    println!("{}", outcome.transformed);

    println!("\nFinal Data Types:");
    for (name, kind) in outcome.transformed.column_kinds() {
        println!("{:<12} {}", name, kind);
    }

    let stats = &outcome.stats;
    println!("\n📊 Transformation Stats:");
    println!("   Records processed: {}", stats.records_processed);
    println!("   Duplicates dropped: {}", stats.duplicates_dropped);
    println!("   NaNs filled: {}", stats.nans_filled);
    println!("   Data quality: {:.2}%", stats.data_quality);
    println!("   Transformations: {}", stats.transformations);

    match outcome.staging.error() {
        None => println!("\n✅ Data loaded into staging table"),
        Some(e) => println!("\n⚠️  Staging load failed: {}", e),
    }
}

fn print_json(outcome: &PipelineOutcome) -> csv_staging_etl::Result<()> {
    let report = RunReport {
        run_id: outcome.run_id.to_string(),
        original: &outcome.original,
        original_kinds: outcome.original.column_kinds(),
        transformed: &outcome.transformed,
        transformed_kinds: outcome.transformed.column_kinds(),
        stats: &outcome.stats,
        started_at: outcome.started_at,
        finished_at: outcome.finished_at,
        staging_error: outcome.staging.error().map(|e| e.to_string()),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
