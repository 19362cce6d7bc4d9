//! Command-line parsing for the YTD screener.
//!
//! Argument parsing stays here; turning flags into an `AnalysisConfig` and
//! dispatching happens in `app`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{ListingKind, Market, Term};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "ytd", version, about = "YTD-low recovery screener for Japanese stocks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Score stocks at their year-to-date low by recovery potential (default).
    Low(LowArgs),
    /// Rank stocks at their year-to-date high by YTD return.
    High(HighArgs),
    /// Print a plain ranking listing (YTD high/low, stop high/low).
    List(ListArgs),
    /// Score an offline metrics CSV.
    Score(ScoreArgs),
    /// Re-render a saved JSON run.
    Show(ShowArgs),
    /// ASCII price chart for one stock.
    Chart(ChartArgs),
    /// Launch the interactive TUI over a recovery run.
    Tui(LowArgs),
}

/// Where the listings and per-stock data come from.
#[derive(Debug, Args, Clone)]
pub struct SourceArgs {
    /// Number of ranking pages to read.
    #[arg(long, default_value_t = 2)]
    pub pages: u32,

    /// Market segment.
    #[arg(long, value_enum, default_value_t = Market::All)]
    pub market: Market,

    /// Ranking period.
    #[arg(long, value_enum, default_value_t = Term::Daily)]
    pub term: Term,

    /// How many listed stocks get the detailed history + fundamentals fetch
    /// [default: 25 for `low`, 20 for `high`].
    #[arg(long)]
    pub detail_limit: Option<usize>,

    /// Use the seeded synthetic market instead of the network.
    #[arg(long)]
    pub sample: bool,

    /// Seed for `--sample`.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Recovery ranking filters. Every criterion is optional.
#[derive(Debug, Args, Clone, Default)]
pub struct RecoveryFilterArgs {
    /// Minimum recovery score (0-100).
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub min_score: Option<u8>,

    /// Minimum recovery from the YTD low, in percent.
    #[arg(long)]
    pub min_recovery: Option<f64>,

    /// Maximum price-to-book ratio (stocks without PBR are excluded).
    #[arg(long)]
    pub max_pb: Option<f64>,

    /// Minimum dividend yield, in percent.
    #[arg(long)]
    pub min_dividend: Option<f64>,

    /// Keep only these sectors (repeatable).
    #[arg(long = "sector", value_name = "SECTOR")]
    pub sectors: Vec<String>,
}

/// Report and export options for the recovery ranking.
#[derive(Debug, Args, Clone)]
pub struct ReportArgs {
    /// Show the top-N ranked stocks.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Print the factor breakdown of each shown stock.
    #[arg(long)]
    pub explain: bool,

    /// Export the filtered ranking to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the whole run (scored + skipped) to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct LowArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub filter: RecoveryFilterArgs,

    #[command(flatten)]
    pub report: ReportArgs,

    /// Render an ASCII chart of the top-ranked stock.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Write a markdown debug bundle under `debug/`.
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Args, Clone)]
pub struct HighArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Minimum YTD return, in percent.
    #[arg(long)]
    pub min_ytd_return: Option<f64>,

    /// Minimum return from the year start to the YTD high, in percent.
    #[arg(long)]
    pub min_high_return: Option<f64>,

    /// Minimum market capitalization (JPY).
    #[arg(long)]
    pub min_market_cap: Option<f64>,

    /// Keep only these sectors (repeatable).
    #[arg(long = "sector", value_name = "SECTOR")]
    pub sectors: Vec<String>,

    /// Show the top-N stocks.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Export the ranking to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    /// Which ranking to read.
    #[arg(long, value_enum, default_value_t = ListingKind::StopHigh)]
    pub kind: ListingKind,

    #[arg(long, default_value_t = 1)]
    pub pages: u32,

    #[arg(long, value_enum, default_value_t = Market::All)]
    pub market: Market,

    #[arg(long, value_enum, default_value_t = Term::Daily)]
    pub term: Term,

    #[arg(long)]
    pub sample: bool,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Export the rows to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ScoreArgs {
    /// Metrics CSV. When omitted, an interactive picker lists CSV files.
    #[arg(short = 'f', long, value_name = "CSV")]
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub filter: RecoveryFilterArgs,

    #[command(flatten)]
    pub report: ReportArgs,
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    /// JSON run written by `--export-json`.
    #[arg(short = 'f', long, value_name = "JSON")]
    pub file: PathBuf,

    #[command(flatten)]
    pub filter: RecoveryFilterArgs,

    #[arg(long, default_value_t = 10)]
    pub top: usize,

    #[arg(long)]
    pub explain: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ChartArgs {
    /// Stock code, e.g. 7203.
    pub code: String,

    #[arg(long)]
    pub sample: bool,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 80)]
    pub width: usize,

    #[arg(long, default_value_t = 20)]
    pub height: usize,
}
