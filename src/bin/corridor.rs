//! Corridor CLI - command-line interface for Corridor Flux
//!
//! Commands:
//! - reconcile: Align closure CSV records onto stored samples and write them back
//! - analyze: Run the analytics pipeline and emit a presentation report
//! - medians: Print the historical median table

use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use corridor_flux::baseline::MedianTable;
use corridor_flux::config::AnalysisWindow;
use corridor_flux::schema::ClosureCsvAdapter;
use corridor_flux::{
    reconcile_closures, AnalysisConfig, ComputeError, CorridorProcessor, Direction, HourMode,
    MemoryStore, SampleStore, FLUX_VERSION,
};

/// Corridor - travel-time reconciliation and analytics for a road segment
#[derive(Parser)]
#[command(name = "corridor")]
#[command(version = FLUX_VERSION)]
#[command(about = "Reconcile and analyze hourly corridor travel times", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align closure records onto stored samples and save the result.
    ///
    /// A direction without a closure file keeps its stored closure data.
    Reconcile {
        /// Sample store JSON file
        #[arg(short, long)]
        samples: PathBuf,

        /// Eastbound closure CSV
        #[arg(long)]
        eastbound_closures: Option<PathBuf>,

        /// Westbound closure CSV
        #[arg(long)]
        westbound_closures: Option<PathBuf>,

        /// Year the closure records belong to (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,

        /// Local offset of the closure timestamps, in minutes east of UTC
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        utc_offset_minutes: i32,

        /// Where to save the updated store (defaults to the input file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the analytics pipeline and write a report
    Analyze {
        /// Sample store JSON file (use - for stdin)
        #[arg(short, long)]
        samples: PathBuf,

        /// Analysis config JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Hour selection mode
        #[arg(long)]
        mode: Option<ModeArg>,

        /// First local date to include (YYYY-MM-DD)
        #[arg(long, requires = "end")]
        start: Option<NaiveDate>,

        /// Last local date to include (YYYY-MM-DD)
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,

        /// Local offset in minutes east of UTC
        #[arg(long, allow_hyphen_values = true)]
        utc_offset_minutes: Option<i32>,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Print the historical median table
    Medians {
        /// Sample store JSON file (use - for stdin)
        #[arg(short, long)]
        samples: PathBuf,

        /// Local offset in minutes east of UTC
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        utc_offset_minutes: i32,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Every hour
    All,
    /// Slowest hour of each day
    Slowest,
    /// Fastest hour of each day
    Fastest,
    /// Slowest minus fastest, per day
    Difference,
}

impl From<ModeArg> for HourMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::All => HourMode::All,
            ModeArg::Slowest => HourMode::Slowest,
            ModeArg::Fastest => HourMode::Fastest,
            ModeArg::Difference => HourMode::Difference,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("corridor_flux=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CorridorCliError> {
    match cli.command {
        Commands::Reconcile {
            samples,
            eastbound_closures,
            westbound_closures,
            year,
            utc_offset_minutes,
            output,
        } => cmd_reconcile(
            &samples,
            eastbound_closures.as_deref(),
            westbound_closures.as_deref(),
            year.unwrap_or_else(|| Utc::now().year()),
            utc_offset_minutes,
            output.as_deref(),
        ),

        Commands::Analyze {
            samples,
            config,
            mode,
            start,
            end,
            utc_offset_minutes,
            output,
            output_format,
        } => {
            let mut settings = match config {
                Some(path) => AnalysisConfig::from_json(&fs::read_to_string(path)?)?,
                None => AnalysisConfig::default(),
            };
            if let Some(mode) = mode {
                settings.mode = mode.into();
            }
            if let (Some(start), Some(end)) = (start, end) {
                settings.window = Some(AnalysisWindow::new(start, end));
            }
            if let Some(offset) = utc_offset_minutes {
                settings.utc_offset_minutes = offset;
            }
            cmd_analyze(&samples, settings, &output, &output_format)
        }

        Commands::Medians {
            samples,
            utc_offset_minutes,
            output_format,
        } => cmd_medians(&samples, utc_offset_minutes, &output_format),
    }
}

fn cmd_reconcile(
    samples: &Path,
    eastbound_closures: Option<&Path>,
    westbound_closures: Option<&Path>,
    year: i32,
    utc_offset_minutes: i32,
    output: Option<&Path>,
) -> Result<(), CorridorCliError> {
    if eastbound_closures.is_none() && westbound_closures.is_none() {
        return Err(CorridorCliError::NoClosures);
    }

    let config = AnalysisConfig {
        utc_offset_minutes,
        ..Default::default()
    };
    config.validate()?;
    let adapter = ClosureCsvAdapter::new(year, config.offset());

    let mut closures = BTreeMap::new();
    for (direction, path) in [
        (Direction::Eastbound, eastbound_closures),
        (Direction::Westbound, westbound_closures),
    ] {
        if let Some(path) = path {
            let events = adapter.parse_str(&fs::read_to_string(path)?)?;
            info!(%direction, events = events.len(), path = %path.display(), "loaded closures");
            closures.insert(direction, events);
        }
    }

    let mut store = MemoryStore::load(samples)?;
    let summary = reconcile_closures(&mut store, &closures);
    store.save(output.unwrap_or(samples))?;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.reports.is_empty() {
        Err(CorridorCliError::NothingReconciled)
    } else {
        Ok(())
    }
}

fn cmd_analyze(
    samples: &Path,
    config: AnalysisConfig,
    output: &Path,
    output_format: &OutputFormat,
) -> Result<(), CorridorCliError> {
    let mut store = MemoryStore::from_json(&read_input(samples)?)?;
    if store.rows().is_empty() {
        return Err(CorridorCliError::NoSamples);
    }

    let mut processor = CorridorProcessor::new(config)?;
    let report = processor.analyze_store(&mut store)?;
    let output_data = format_output(&report, output_format)?;

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_medians(
    samples: &Path,
    utc_offset_minutes: i32,
    output_format: &OutputFormat,
) -> Result<(), CorridorCliError> {
    let config = AnalysisConfig {
        utc_offset_minutes,
        ..Default::default()
    };
    config.validate()?;

    let mut store = MemoryStore::from_json(&read_input(samples)?)?;
    let history = store.fetch_all()?;
    if history.is_empty() {
        return Err(CorridorCliError::NoSamples);
    }

    let table = MedianTable::build(&history, config.offset());
    println!("{}", format_output(&table.summaries(), output_format)?);
    Ok(())
}

// Helper functions

fn read_input(path: &Path) -> Result<String, CorridorCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn format_output<T: Serialize>(
    value: &T,
    format: &OutputFormat,
) -> Result<String, CorridorCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(value)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)?),
    }
}

// Error types

#[derive(Debug)]
enum CorridorCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoSamples,
    NoClosures,
    NothingReconciled,
}

impl From<io::Error> for CorridorCliError {
    fn from(e: io::Error) -> Self {
        CorridorCliError::Io(e)
    }
}

impl From<ComputeError> for CorridorCliError {
    fn from(e: ComputeError) -> Self {
        CorridorCliError::Compute(e)
    }
}

impl From<serde_json::Error> for CorridorCliError {
    fn from(e: serde_json::Error) -> Self {
        CorridorCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CorridorCliError> for CliError {
    fn from(e: CorridorCliError) -> Self {
        match e {
            CorridorCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CorridorCliError::Compute(ComputeError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Check the analysis window, offset, and route length".to_string()),
            },
            CorridorCliError::Compute(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(
                    "Ensure samples are a JSON array of stored rows and closures are CSV"
                        .to_string(),
                ),
            },
            CorridorCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CorridorCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No samples found in input".to_string(),
                hint: Some("Ensure the sample store is not empty".to_string()),
            },
            CorridorCliError::NoClosures => CliError {
                code: "NO_CLOSURES".to_string(),
                message: "No closure files given".to_string(),
                hint: Some("Pass --eastbound-closures and/or --westbound-closures".to_string()),
            },
            CorridorCliError::NothingReconciled => CliError {
                code: "NOTHING_RECONCILED".to_string(),
                message: "Every direction failed to reconcile".to_string(),
                hint: Some("Review the log output for store errors".to_string()),
            },
        }
    }
}
