//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during scoring and ranking
//! - exported to JSON/CSV
//! - reloaded later for reporting

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which ranking page to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ListingKind {
    /// Stocks printing a new year-to-date high.
    YtdHigh,
    /// Stocks printing a new year-to-date low.
    YtdLow,
    /// Stocks that hit the daily upper price limit.
    StopHigh,
    /// Stocks that hit the daily lower price limit.
    StopLow,
}

impl ListingKind {
    pub const ALL: [ListingKind; 4] = [
        ListingKind::YtdHigh,
        ListingKind::YtdLow,
        ListingKind::StopHigh,
        ListingKind::StopLow,
    ];

    /// Path segment of the ranking page.
    pub fn slug(self) -> &'static str {
        match self {
            ListingKind::YtdHigh => "yearToDateHigh",
            ListingKind::YtdLow => "yearToDateLow",
            ListingKind::StopHigh => "stopHigh",
            ListingKind::StopLow => "stopLow",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ListingKind::YtdHigh => "YTD high",
            ListingKind::YtdLow => "YTD low",
            ListingKind::StopHigh => "Stop high",
            ListingKind::StopLow => "Stop low",
        }
    }

    /// Short tag used in file names.
    pub fn file_tag(self) -> &'static str {
        match self {
            ListingKind::YtdHigh => "ytd_high",
            ListingKind::YtdLow => "ytd_low",
            ListingKind::StopHigh => "stop_high",
            ListingKind::StopLow => "stop_low",
        }
    }

    /// Price-limit listings carry change/volume columns instead of YTD prices.
    pub fn is_stop(self) -> bool {
        matches!(self, ListingKind::StopHigh | ListingKind::StopLow)
    }
}

/// Market segment filter accepted by the ranking pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    All,
    Tokyo,
    Osaka,
    Nagoya,
    Sapporo,
    Fukuoka,
}

impl Market {
    pub fn as_param(self) -> &'static str {
        match self {
            Market::All => "all",
            Market::Tokyo => "tokyo",
            Market::Osaka => "osaka",
            Market::Nagoya => "nagoya",
            Market::Sapporo => "sapporo",
            Market::Fukuoka => "fukuoka",
        }
    }
}

/// Ranking period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    Daily,
    Weekly,
    Monthly,
}

impl Term {
    pub fn as_param(self) -> &'static str {
        match self {
            Term::Daily => "daily",
            Term::Weekly => "weekly",
            Term::Monthly => "monthly",
        }
    }
}

/// One ranking page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingQuery {
    pub kind: ListingKind,
    pub market: Market,
    pub term: Term,
    /// 1-based page number.
    pub page: u32,
}

/// A single row scraped from a ranking page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockListing {
    pub rank: u32,
    pub code: String,
    pub name: String,
    pub market: Option<String>,
    pub url: String,
    /// Remaining cell texts, in page order (price, change, volume, ...).
    #[serde(default)]
    pub columns: Vec<String>,
}

impl StockListing {
    pub fn market_label(&self) -> &str {
        self.market.as_deref().unwrap_or("unknown")
    }
}

/// One daily OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Company fundamentals. Every field is optional: the provider may not know it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub long_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    /// Dividend yield in percent (3.0 == 3%).
    pub dividend_yield_pct: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume: Option<u64>,
    pub avg_volume: Option<u64>,
}

/// Input bundle for the recovery score.
///
/// Optional fields are `None` when the value is unknown or not meaningful;
/// they are never encoded as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMetrics {
    pub code: String,
    pub current_price: f64,
    pub ytd_low: f64,
    pub recovery_from_low_pct: f64,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub dividend_yield_pct: f64,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub volatility_pct: Option<f64>,
    pub max_drawdown_pct: Option<f64>,
}

/// Rule category of the recovery score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorCategory {
    Base,
    Recovery,
    PriceToBook,
    PriceToEarnings,
    Dividend,
    Trend,
    Volatility,
    Drawdown,
}

impl FactorCategory {
    pub fn display_name(self) -> &'static str {
        match self {
            FactorCategory::Base => "base",
            FactorCategory::Recovery => "recovery from low",
            FactorCategory::PriceToBook => "price-to-book",
            FactorCategory::PriceToEarnings => "price-to-earnings",
            FactorCategory::Dividend => "dividend yield",
            FactorCategory::Trend => "moving-average trend",
            FactorCategory::Volatility => "volatility",
            FactorCategory::Drawdown => "drawdown depth",
        }
    }
}

/// Points awarded by one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factor {
    pub category: FactorCategory,
    pub label: String,
    pub points: u32,
}

/// Qualitative rank derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Weak,
    Neutral,
    Promising,
    Strong,
}

impl Grade {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => Grade::Strong,
            70..=79 => Grade::Promising,
            60..=69 => Grade::Neutral,
            _ => Grade::Weak,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Grade::Strong => "strong",
            Grade::Promising => "promising",
            Grade::Neutral => "neutral",
            Grade::Weak => "weak",
        }
    }
}

/// Output of the recovery score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Clamped score in `[0, 100]`.
    pub score: u8,
    /// Unclamped sum of the awarded points.
    pub raw_total: u32,
    /// Awarded factors, base first, then in rule-table order.
    pub factors: Vec<Factor>,
    pub grade: Grade,
}

/// Extra YTD figures reported next to the recovery score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowDetail {
    pub ytd_low_date: NaiveDate,
    pub ytd_high: f64,
    pub ytd_high_date: NaiveDate,
    pub year_start_price: f64,
    pub ytd_return_pct: f64,
    /// Decline from the year-start close to the YTD low (negative when lower).
    pub low_decline_pct: f64,
}

/// Performance figures for the YTD-high analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighMetrics {
    pub code: String,
    pub current_price: f64,
    pub ytd_high: f64,
    pub ytd_high_date: NaiveDate,
    pub ytd_low: f64,
    pub ytd_low_date: NaiveDate,
    pub year_start_price: f64,
    pub ytd_return_pct: f64,
    pub high_return_pct: f64,
}

/// A YTD-low stock with its metrics and recovery score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredStock {
    pub listing: StockListing,
    pub fundamentals: Fundamentals,
    pub metrics: StockMetrics,
    pub detail: Option<LowDetail>,
    pub score: ScoreResult,
    /// Price history used to build the metrics (not persisted).
    #[serde(skip)]
    pub history: Vec<PriceBar>,
}

/// A YTD-high stock with its performance figures.
#[derive(Debug, Clone, PartialEq)]
pub struct HighStock {
    pub listing: StockListing,
    pub fundamentals: Fundamentals,
    pub metrics: HighMetrics,
}

/// A stock left out of the ranking, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedStock {
    pub code: String,
    pub name: String,
    pub reason: String,
}

/// Conjunctive filter over scored YTD-low stocks. `None` disables a criterion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveryFilter {
    pub min_score: Option<u8>,
    pub min_recovery_from_low: Option<f64>,
    pub max_pb_ratio: Option<f64>,
    pub min_dividend_yield: Option<f64>,
    pub sectors: Vec<String>,
}

/// Conjunctive filter over YTD-high stocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighFilter {
    pub min_ytd_return: Option<f64>,
    pub min_high_return: Option<f64>,
    pub min_market_cap: Option<f64>,
    pub sectors: Vec<String>,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub kind: ListingKind,
    pub market: Market,
    pub term: Term,
    pub pages: u32,
    /// How many listings get the detailed (history + fundamentals) fetch.
    pub detail_limit: usize,
    pub top_n: usize,

    pub recovery_filter: RecoveryFilter,
    pub high_filter: HighFilter,

    pub explain: bool,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub debug: bool,

    pub export_csv: Option<PathBuf>,
    pub export_json: Option<PathBuf>,

    /// Use the seeded synthetic source instead of the network.
    pub sample: bool,
    pub sample_seed: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            kind: ListingKind::YtdLow,
            market: Market::All,
            term: Term::Daily,
            pages: 2,
            detail_limit: 25,
            top_n: 10,
            recovery_filter: RecoveryFilter::default(),
            high_filter: HighFilter::default(),
            explain: false,
            plot: false,
            plot_width: 80,
            plot_height: 20,
            debug: false,
            export_csv: None,
            export_json: None,
            sample: false,
            sample_seed: 42,
        }
    }
}

/// A saved run (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub tool: String,
    /// RFC 3339 timestamp of the run.
    pub generated: String,
    pub kind: ListingKind,
    pub scored: Vec<ScoredStock>,
    pub skipped: Vec<SkippedStock>,
}
