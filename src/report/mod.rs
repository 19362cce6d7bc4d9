//! Reporting: summary statistics over a run, plus terminal formatting
//! (`format`).

use std::collections::HashMap;

use crate::domain::{HighStock, ScoredStock, StockListing};

pub mod format;

pub use format::*;

/// How many entries the sector/market distributions keep.
pub const DISTRIBUTION_TOP: usize = 5;

/// Column (after the name cell) holding traded volume on price-limit pages.
pub const VOLUME_COLUMN: usize = 3;

/// Aggregate figures over the reported YTD-low stocks.
#[derive(Debug, Clone, PartialEq)]
pub struct LowSummary {
    pub count: usize,
    pub mean_decline_pct: Option<f64>,
    pub min_decline_pct: Option<f64>,
    pub max_decline_pct: Option<f64>,
    pub mean_recovery_pct: Option<f64>,
    pub mean_score: Option<f64>,
    pub sectors: Vec<(String, usize)>,
    pub markets: Vec<(String, usize)>,
}

/// Aggregate figures over the reported YTD-high stocks.
#[derive(Debug, Clone, PartialEq)]
pub struct HighSummary {
    pub count: usize,
    pub mean_return_pct: Option<f64>,
    pub max_return_pct: Option<f64>,
    pub min_return_pct: Option<f64>,
    pub sectors: Vec<(String, usize)>,
    pub markets: Vec<(String, usize)>,
}

/// Traded-volume statistics parsed from listing rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeStats {
    pub mean: f64,
    pub max: u64,
    pub min: u64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingSummary {
    pub count: usize,
    /// `(market, count, percent of all rows)`, most frequent first.
    pub markets: Vec<(String, usize, f64)>,
    pub volume: Option<VolumeStats>,
}

pub fn summarize_low(stocks: &[&ScoredStock]) -> LowSummary {
    let declines: Vec<f64> = stocks
        .iter()
        .filter_map(|s| s.detail.as_ref().map(|d| d.low_decline_pct))
        .collect();
    let recoveries: Vec<f64> = stocks.iter().map(|s| s.metrics.recovery_from_low_pct).collect();
    let scores: Vec<f64> = stocks.iter().map(|s| s.score.score as f64).collect();

    LowSummary {
        count: stocks.len(),
        mean_decline_pct: mean(&declines),
        min_decline_pct: declines.iter().copied().reduce(f64::min),
        max_decline_pct: declines.iter().copied().reduce(f64::max),
        mean_recovery_pct: mean(&recoveries),
        mean_score: mean(&scores),
        sectors: distribution(
            stocks.iter().map(|s| sector_label(s.fundamentals.sector.as_deref())),
            DISTRIBUTION_TOP,
        ),
        markets: distribution(stocks.iter().map(|s| s.listing.market_label()), DISTRIBUTION_TOP),
    }
}

pub fn summarize_high(stocks: &[HighStock]) -> HighSummary {
    let returns: Vec<f64> = stocks.iter().map(|s| s.metrics.ytd_return_pct).collect();
    HighSummary {
        count: stocks.len(),
        mean_return_pct: mean(&returns),
        max_return_pct: returns.iter().copied().reduce(f64::max),
        min_return_pct: returns.iter().copied().reduce(f64::min),
        sectors: distribution(
            stocks.iter().map(|s| sector_label(s.fundamentals.sector.as_deref())),
            DISTRIBUTION_TOP,
        ),
        markets: distribution(stocks.iter().map(|s| s.listing.market_label()), DISTRIBUTION_TOP),
    }
}

pub fn summarize_listing(rows: &[StockListing], parse_volume: bool) -> ListingSummary {
    let total = rows.len();
    let markets = distribution(rows.iter().map(|r| r.market_label()), usize::MAX)
        .into_iter()
        .map(|(m, n)| {
            let pct = if total == 0 { 0.0 } else { n as f64 / total as f64 * 100.0 };
            (m, n, pct)
        })
        .collect();

    let volume = if parse_volume {
        let volumes: Vec<u64> = rows
            .iter()
            .filter_map(|r| r.columns.get(VOLUME_COLUMN))
            .filter_map(|c| parse_volume_cell(c))
            .collect();
        volume_stats(&volumes)
    } else {
        None
    };

    ListingSummary {
        count: total,
        markets,
        volume,
    }
}

/// `"1,234,500株"` -> 1234500. Anything else that is not all digits is ignored.
pub fn parse_volume_cell(cell: &str) -> Option<u64> {
    let cleaned: String = cell.chars().filter(|c| *c != ',' && *c != '株').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse().ok()
}

fn volume_stats(volumes: &[u64]) -> Option<VolumeStats> {
    let max = *volumes.iter().max()?;
    let min = *volumes.iter().min()?;
    let mean = volumes.iter().map(|v| *v as f64).sum::<f64>() / volumes.len() as f64;
    Some(VolumeStats {
        mean,
        max,
        min,
        sample_size: volumes.len(),
    })
}

fn sector_label(sector: Option<&str>) -> &str {
    sector.filter(|s| !s.is_empty()).unwrap_or("unknown")
}

/// Count labels, most frequent first (ties alphabetical), keep `top`.
pub fn distribution<'a>(labels: impl Iterator<Item = &'a str>, top: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    let mut out: Vec<(String, usize)> = counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out.truncate(top);
    out
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, market: Option<&str>, volume: &str) -> StockListing {
        StockListing {
            rank: 1,
            code: code.to_string(),
            name: code.to_string(),
            market: market.map(str::to_string),
            url: String::new(),
            columns: vec!["100".into(), "-30".into(), "-23.08".into(), volume.into()],
        }
    }

    #[test]
    fn distribution_orders_by_count_then_label() {
        let d = distribution(["b", "a", "b", "c", "a", "b"].into_iter(), 2);
        assert_eq!(d, vec![("b".to_string(), 3), ("a".to_string(), 2)]);
    }

    #[test]
    fn listing_summary_percentages_and_volume() {
        let rows = vec![
            row("1", Some("東証PRM"), "1,000"),
            row("2", Some("東証PRM"), "3,000株"),
            row("3", None, "-"),
            row("4", Some("東証GRT"), "2000"),
        ];
        let s = summarize_listing(&rows, true);
        assert_eq!(s.count, 4);
        assert_eq!(s.markets[0], ("東証PRM".to_string(), 2, 50.0));
        let v = s.volume.unwrap();
        assert_eq!(v.sample_size, 3);
        assert_eq!(v.max, 3000);
        assert_eq!(v.min, 1000);
        assert!((v.mean - 2000.0).abs() < 1e-9);

        assert!(summarize_listing(&rows, false).volume.is_none());
    }

    #[test]
    fn volume_cell_parsing() {
        assert_eq!(parse_volume_cell("12,345株"), Some(12_345));
        assert_eq!(parse_volume_cell("---"), None);
        assert_eq!(parse_volume_cell(""), None);
        assert_eq!(parse_volume_cell("1.5M"), None);
    }

    #[test]
    fn empty_low_summary_has_no_means() {
        let s = summarize_low(&[]);
        assert_eq!(s.count, 0);
        assert_eq!(s.mean_score, None);
        assert!(s.sectors.is_empty());
    }
}
