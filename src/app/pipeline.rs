//! Shared analysis pipeline used by both CLI and TUI front-ends.
//!
//! listing pages -> per-stock history + fundamentals -> metrics -> score -> rank
//!
//! The front-ends only deal with presentation. A single stock failing never
//! aborts a run; it becomes a `SkippedStock` with the reason.

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analysis::{build_high_metrics, build_low_metrics};
use crate::data::{MarketData, RequestSummary};
use crate::domain::{
    AnalysisConfig, Fundamentals, HighStock, ListingKind, ListingQuery, PriceBar, RecoveryFilter,
    ScoredStock, SkippedStock, StockListing,
};
use crate::error::AppError;
use crate::io::IngestedMetrics;
use crate::score::{rank_by_return, rank_by_score, score};

/// Detail-fetch limit for the YTD-high analysis when none is configured.
pub const DEFAULT_HIGH_DETAIL_LIMIT: usize = 20;

/// All outputs of a YTD-low recovery run.
#[derive(Debug, Clone)]
pub struct LowRun {
    pub source: String,
    pub listings: Vec<StockListing>,
    /// Every scored stock, ranked (unfiltered).
    pub scored: Vec<ScoredStock>,
    pub skipped: Vec<SkippedStock>,
    pub requests: Option<RequestSummary>,
}

impl LowRun {
    /// Ranked stocks that pass `filter`.
    pub fn filtered(&self, filter: &RecoveryFilter) -> Vec<&ScoredStock> {
        filter.apply(&self.scored)
    }
}

/// All outputs of a YTD-high performance run.
#[derive(Debug, Clone)]
pub struct HighRun {
    pub source: String,
    pub listings: Vec<StockListing>,
    /// Ranked by YTD return, filter applied.
    pub stocks: Vec<HighStock>,
    pub skipped: Vec<SkippedStock>,
    pub requests: Option<RequestSummary>,
}

/// Candidate that got through fetching, waiting to be scored.
struct Fetched {
    listing: StockListing,
    fundamentals: Fundamentals,
    history: Vec<PriceBar>,
}

/// Execute the YTD-low recovery analysis against `source`.
pub fn run_low_analysis(source: &dyn MarketData, config: &AnalysisConfig) -> Result<LowRun, AppError> {
    let listings = fetch_listing_pages(source, ListingKind::YtdLow, config)?;
    let (fetched, mut skipped) = fetch_details(source, &listings, config.detail_limit);

    let built: Vec<Result<ScoredStock, SkippedStock>> = fetched
        .into_par_iter()
        .map(|f| {
            let code = f.listing.code.clone();
            let (metrics, detail) = build_low_metrics(&code, &f.history, &f.fundamentals)
                .map_err(|e| skip(&f.listing, e.message()))?;
            let result = score(&metrics).map_err(|e| skip(&f.listing, &e.to_string()))?;
            Ok(ScoredStock {
                listing: f.listing,
                fundamentals: f.fundamentals,
                metrics,
                detail: Some(detail),
                score: result,
                history: f.history,
            })
        })
        .collect();

    let mut scored = Vec::with_capacity(built.len());
    for item in built {
        match item {
            Ok(stock) => scored.push(stock),
            Err(s) => {
                warn!(code = %s.code, reason = %s.reason, "skipping stock");
                skipped.push(s);
            }
        }
    }
    rank_by_score(&mut scored);

    info!(
        scored = scored.len(),
        skipped = skipped.len(),
        "recovery analysis finished"
    );

    Ok(LowRun {
        source: source.name().to_string(),
        listings,
        scored,
        skipped,
        requests: source.request_summary(),
    })
}

/// Execute the YTD-high performance analysis against `source`.
pub fn run_high_analysis(source: &dyn MarketData, config: &AnalysisConfig) -> Result<HighRun, AppError> {
    let listings = fetch_listing_pages(source, ListingKind::YtdHigh, config)?;
    let (fetched, mut skipped) = fetch_details(source, &listings, config.detail_limit);

    let mut stocks = Vec::with_capacity(fetched.len());
    for f in fetched {
        match build_high_metrics(&f.listing.code, &f.history) {
            Ok(metrics) => stocks.push(HighStock {
                listing: f.listing,
                fundamentals: f.fundamentals,
                metrics,
            }),
            Err(e) => {
                let s = skip(&f.listing, e.message());
                warn!(code = %s.code, reason = %s.reason, "skipping stock");
                skipped.push(s);
            }
        }
    }

    rank_by_return(&mut stocks);
    let before = stocks.len();
    stocks.retain(|s| config.high_filter.matches(s));
    if before != stocks.len() {
        info!(kept = stocks.len(), dropped = before - stocks.len(), "applied high filter");
    }

    Ok(HighRun {
        source: source.name().to_string(),
        listings,
        stocks,
        skipped,
        requests: source.request_summary(),
    })
}

/// Plain ranking listing of `config.kind`.
pub fn run_listing(source: &dyn MarketData, config: &AnalysisConfig) -> Result<Vec<StockListing>, AppError> {
    fetch_listing_pages(source, config.kind, config)
}

/// Fetch pages `1..=pages`, stopping at the first empty page.
///
/// Failing pages are logged and skipped. Rows repeated across pages are
/// kept once (first occurrence wins).
fn fetch_listing_pages(
    source: &dyn MarketData,
    kind: ListingKind,
    config: &AnalysisConfig,
) -> Result<Vec<StockListing>, AppError> {
    if config.pages == 0 {
        return Err(AppError::new(2, "--pages must be >= 1."));
    }

    let mut out: Vec<StockListing> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for page in 1..=config.pages {
        let query = ListingQuery {
            kind,
            market: config.market,
            term: config.term,
            page,
        };
        info!(kind = kind.display_name(), page, "fetching ranking page");
        match source.fetch_listing(&query) {
            Ok(rows) if rows.is_empty() => {
                info!(page, "empty ranking page, stopping");
                break;
            }
            Ok(rows) => {
                debug!(page, rows = rows.len(), "ranking page parsed");
                for row in rows {
                    if seen.insert(row.code.clone()) {
                        out.push(row);
                    }
                }
            }
            Err(e) => warn!(page, error = %e, "ranking page failed"),
        }
    }

    if out.is_empty() {
        return Err(AppError::new(
            3,
            format!("No {} listings could be fetched.", kind.display_name()),
        ));
    }
    info!(listings = out.len(), "listings fetched");
    Ok(out)
}

/// Fetch history and fundamentals for the first `limit` listings.
///
/// A missing history skips the stock; missing fundamentals only leave the
/// optional factors unknown.
fn fetch_details(
    source: &dyn MarketData,
    listings: &[StockListing],
    limit: usize,
) -> (Vec<Fetched>, Vec<SkippedStock>) {
    let targets = &listings[..listings.len().min(limit)];
    let mut fetched = Vec::with_capacity(targets.len());
    let mut skipped = Vec::new();

    for (i, listing) in targets.iter().enumerate() {
        info!(index = i + 1, total = targets.len(), code = %listing.code, "analyzing");
        if listing.code.starts_with("UNKNOWN_") {
            let s = skip(listing, "no stock code on the ranking row");
            warn!(code = %s.code, reason = %s.reason, "skipping stock");
            skipped.push(s);
            continue;
        }

        let history = match source.fetch_history(&listing.code) {
            Ok(h) if !h.is_empty() => h,
            Ok(_) => {
                let s = skip(listing, "empty price history");
                warn!(code = %s.code, reason = %s.reason, "skipping stock");
                skipped.push(s);
                continue;
            }
            Err(e) => {
                let s = skip(listing, e.message());
                warn!(code = %s.code, reason = %s.reason, "skipping stock");
                skipped.push(s);
                continue;
            }
        };

        let mut fundamentals = source.fetch_fundamentals(&listing.code).unwrap_or_else(|e| {
            warn!(code = %listing.code, error = %e, "fundamentals unavailable");
            Fundamentals::default()
        });

        let mut listing = listing.clone();
        if listing.name.is_empty() {
            listing.name = fundamentals.long_name.clone().unwrap_or_default();
        }
        if fundamentals.long_name.is_none() && !listing.name.is_empty() {
            fundamentals.long_name = Some(listing.name.clone());
        }

        fetched.push(Fetched {
            listing,
            fundamentals,
            history,
        });
    }

    (fetched, skipped)
}

/// Score rows of an offline metrics CSV. Row errors become skipped stocks.
pub fn score_ingested(origin: &str, data: IngestedMetrics) -> LowRun {
    let mut skipped: Vec<SkippedStock> = data
        .row_errors
        .iter()
        .map(|e| SkippedStock {
            code: e.code.clone().unwrap_or_else(|| "-".to_string()),
            name: String::new(),
            reason: format!("line {}: {}", e.line, e.message),
        })
        .collect();

    let listings: Vec<StockListing> = data.rows.iter().map(|r| r.listing.clone()).collect();
    let built: Vec<Result<ScoredStock, SkippedStock>> = data
        .rows
        .into_par_iter()
        .map(|row| {
            let result = score(&row.metrics).map_err(|e| skip(&row.listing, &e.to_string()))?;
            Ok(ScoredStock {
                listing: row.listing,
                fundamentals: row.fundamentals,
                metrics: row.metrics,
                detail: None,
                score: result,
                history: Vec::new(),
            })
        })
        .collect();

    let mut scored = Vec::with_capacity(built.len());
    for item in built {
        match item {
            Ok(stock) => scored.push(stock),
            Err(s) => skipped.push(s),
        }
    }
    for s in &skipped {
        warn!(code = %s.code, reason = %s.reason, "skipping row");
    }
    rank_by_score(&mut scored);
    info!(
        rows = data.rows_read,
        scored = scored.len(),
        skipped = skipped.len(),
        "offline scoring finished"
    );

    LowRun {
        source: origin.to_string(),
        listings,
        scored,
        skipped,
        requests: None,
    }
}

fn skip(listing: &StockListing, reason: &str) -> SkippedStock {
    SkippedStock {
        code: listing.code.clone(),
        name: listing.name.clone(),
        reason: reason.to_string(),
    }
}
