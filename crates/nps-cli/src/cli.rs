//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "nps",
    version,
    about = "Register score exports, enrich them from the lookup and review summaries",
    long_about = "Register neuropsychological score exports (Parquet, Feather, CSV) in an \
                  embedded DuckDB engine, classify every row against the master lookup and \
                  review domain summaries and unmapped join keys."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

/// Options shared by every command; they override the config file.
#[derive(Args, Clone, Default)]
pub struct SessionArgs {
    /// TOML configuration file.
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Master lookup CSV.
    #[arg(long = "lookup", value_name = "PATH", global = true)]
    pub lookup: Option<PathBuf>,

    /// Directory of source exports to register.
    #[arg(long = "data-dir", value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Database file (in-memory when omitted).
    #[arg(long = "database", value_name = "PATH", global = true)]
    pub database: Option<PathBuf>,

    /// Never try to download engine extensions.
    #[arg(long = "offline", global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register the data directory and list relations and capabilities.
    Register(OutputArgs),

    /// Print the domain summary.
    Summary(SummaryArgs),

    /// Print enriched rows for one domain of one stream.
    Process(ProcessArgs),

    /// Run a read query against the registered relations.
    Query(QueryArgs),

    /// Print the unmapped join-key log.
    Unmapped(OutputArgs),
}

#[derive(Args, Clone, Copy, Default)]
pub struct OutputArgs {
    /// Emit JSON instead of a table.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Args)]
pub struct SummaryArgs {
    /// Taxonomy level to group by.
    #[arg(long = "level", value_enum, default_value = "domain")]
    pub level: LevelArg,

    /// Also group by stream.
    #[arg(long = "by-stream")]
    pub by_stream: bool,

    /// Only list categories that have scored rows.
    #[arg(long = "data-only")]
    pub data_only: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct ProcessArgs {
    /// Domain to select (exact match).
    #[arg(value_name = "DOMAIN")]
    pub domain: String,

    /// Stream the rows come from.
    #[arg(long = "stream", value_enum, default_value = "neurocog")]
    pub stream: StreamArg,

    /// Restrict to these scales (repeatable).
    #[arg(long = "scale", value_name = "NAME")]
    pub scales: Vec<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct QueryArgs {
    /// SQL text of a read query.
    #[arg(value_name = "SQL")]
    pub sql: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LevelArg {
    Domain,
    Subdomain,
    Narrow,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StreamArg {
    Neurocog,
    Neurobehav,
    Validity,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
