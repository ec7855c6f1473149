//! CLI definitions.

pub mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quotewatch")]
#[command(author, version, about = "Multi-source daily quote ingestion")]
pub struct Cli {
    /// Configuration file path (defaults to config/default.toml when present)
    #[arg(short, long, env = "QUOTEWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level, overrides the configured one
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe every source once and print the health report
    CheckSources,
    /// Probe sources periodically until Ctrl-C
    Watch,
    /// Fetch, screen and store bars, then compute indicators and signals
    Ingest(IngestArgs),
    /// Compute indicators and signals for a local CSV file
    Indicators(IndicatorsArgs),
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct IngestArgs {
    /// Symbols to ingest (comma-separated)
    #[arg(short = 'S', long, value_delimiter = ',', required = true)]
    pub symbols: Vec<String>,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end: NaiveDate,

    /// Directory of <SYMBOL>.csv files (plus optional instruments.csv) used
    /// instead of the configured sources
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(clap::Args)]
pub struct IndicatorsArgs {
    /// Data file (CSV)
    #[arg(long)]
    pub data: PathBuf,

    /// Symbol the file holds
    #[arg(short = 'S', long)]
    pub symbol: String,

    /// Only print the newest N rows
    #[arg(long)]
    pub last: Option<usize>,
}
