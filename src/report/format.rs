//! Formatted terminal output.
//!
//! Formatting lives in one place so the scoring code stays free of
//! presentation and output changes are localized. Missing values render
//! as `-`.

use crate::app::pipeline::{HighRun, LowRun};
use crate::data::RequestSummary;
use crate::domain::{
    AnalysisConfig, HighFilter, HighStock, ListingKind, RecoveryFilter, ScoredStock, SkippedStock,
    StockListing,
};
use crate::report::{HighSummary, ListingSummary, LowSummary};

/// Rows shown by the plain listing report.
pub const LISTING_PREVIEW: usize = 20;

/// Run header for the YTD-low analysis.
pub fn format_low_header(run: &LowRun, config: &AnalysisConfig, shown: usize) -> String {
    let mut out = String::new();
    out.push_str("=== ytd - YTD-low recovery screen ===\n");
    out.push_str(&format!("Source: {}\n", run.source));
    out.push_str(&format!(
        "Query: market={} | term={} | pages={}\n",
        config.market.as_param(),
        config.term.as_param(),
        config.pages
    ));
    out.push_str(&format!(
        "Listings: {} | analyzed: {} | skipped: {} | shown: {}\n",
        run.listings.len(),
        run.scored.len(),
        run.skipped.len(),
        shown
    ));
    out.push_str(&format!("Filter: {}\n", describe_recovery_filter(&config.recovery_filter)));
    if let Some(req) = &run.requests {
        out.push_str(&format_requests(req));
    }
    out
}

/// Run header for offline scoring (metrics CSV or saved JSON run).
pub fn format_offline_header(run: &LowRun, filter: &RecoveryFilter, shown: usize) -> String {
    let mut out = String::new();
    out.push_str("=== ytd - offline recovery scores ===\n");
    out.push_str(&format!("Input: {}\n", run.source));
    out.push_str(&format!(
        "Rows: {} | scored: {} | skipped: {} | shown: {}\n",
        run.listings.len(),
        run.scored.len(),
        run.skipped.len(),
        shown
    ));
    out.push_str(&format!("Filter: {}\n", describe_recovery_filter(filter)));
    out
}

pub fn format_high_header(run: &HighRun, config: &AnalysisConfig) -> String {
    let mut out = String::new();
    out.push_str("=== ytd - YTD-high performance screen ===\n");
    out.push_str(&format!("Source: {}\n", run.source));
    out.push_str(&format!(
        "Query: market={} | term={} | pages={}\n",
        config.market.as_param(),
        config.term.as_param(),
        config.pages
    ));
    out.push_str(&format!(
        "Listings: {} | kept: {} | skipped: {}\n",
        run.listings.len(),
        run.stocks.len(),
        run.skipped.len()
    ));
    out.push_str(&format!("Filter: {}\n", describe_high_filter(&config.high_filter)));
    if let Some(req) = &run.requests {
        out.push_str(&format_requests(req));
    }
    out
}

pub fn format_requests(req: &RequestSummary) -> String {
    format!(
        "Requests: {} ({} ok, {} failed, {:.1}% success) | total {:.1}s | mean {:.2}s\n",
        req.requests,
        req.successes,
        req.failures,
        req.success_rate_pct(),
        req.total_secs,
        req.mean_secs()
    )
}

pub fn describe_recovery_filter(filter: &RecoveryFilter) -> String {
    let mut parts = Vec::new();
    if let Some(v) = filter.min_score {
        parts.push(format!("score>={v}"));
    }
    if let Some(v) = filter.min_recovery_from_low {
        parts.push(format!("recovery>={v}%"));
    }
    if let Some(v) = filter.max_pb_ratio {
        parts.push(format!("pbr<={v}"));
    }
    if let Some(v) = filter.min_dividend_yield {
        parts.push(format!("dividend>={v}%"));
    }
    if !filter.sectors.is_empty() {
        parts.push(format!("sector in [{}]", filter.sectors.join(", ")));
    }
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(" & ")
    }
}

pub fn describe_high_filter(filter: &HighFilter) -> String {
    let mut parts = Vec::new();
    if let Some(v) = filter.min_ytd_return {
        parts.push(format!("ytd return>={v}%"));
    }
    if let Some(v) = filter.min_high_return {
        parts.push(format!("high return>={v}%"));
    }
    if let Some(v) = filter.min_market_cap {
        parts.push(format!("market cap>={v:.0}"));
    }
    if !filter.sectors.is_empty() {
        parts.push(format!("sector in [{}]", filter.sectors.join(", ")));
    }
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(" & ")
    }
}

/// Recovery ranking table.
pub fn format_recovery_table(rows: &[&ScoredStock]) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:>4} {:<6} {:<20} {:<8} {:>5} {:<9} {:>9} {:>7} {:>7} {:>6} {:>6} {:>6}",
            "rank", "code", "name", "market", "score", "grade", "recovery", "ddown", "vol", "pbr", "per", "div%"
        ),
    );
    push_line(
        &mut out,
        format!(
            "{:-<4} {:-<6} {:-<20} {:-<8} {:-<5} {:-<9} {:-<9} {:-<7} {:-<7} {:-<6} {:-<6} {:-<6}",
            "", "", "", "", "", "", "", "", "", "", "", ""
        ),
    );
    for (i, s) in rows.iter().enumerate() {
        let m = &s.metrics;
        push_line(
            &mut out,
            format!(
                "{:>4} {:<6} {:<20} {:<8} {:>5} {:<9} {:>9} {:>7} {:>7} {:>6} {:>6} {:>6}",
                i + 1,
                truncate(&m.code, 6),
                truncate(&s.listing.name, 20),
                truncate(s.listing.market_label(), 8),
                s.score.score,
                s.score.grade.display_name(),
                format!("{:.1}%", m.recovery_from_low_pct),
                fmt_pct(m.max_drawdown_pct),
                fmt_pct(m.volatility_pct),
                fmt_opt(m.pb_ratio, 2),
                fmt_opt(m.pe_ratio, 1),
                fmt_opt(s.fundamentals.dividend_yield_pct, 2),
            ),
        );
    }
    out
}

/// Factor-by-factor explanation of one stock's score.
pub fn format_factor_breakdown(stock: &ScoredStock) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "[{}] {} - score {} ({})\n",
        stock.metrics.code,
        stock.listing.name,
        stock.score.score,
        stock.score.grade.display_name()
    ));
    for f in &stock.score.factors {
        push_line(
            &mut out,
            format!("  {:>+4}  {:<22} {}", f.points, f.category.display_name(), f.label),
        );
    }
    let clamp_note = if stock.score.raw_total > stock.score.score as u32 {
        " (clamped)"
    } else {
        ""
    };
    out.push_str(&format!("  raw total {}{clamp_note}\n", stock.score.raw_total));
    out
}

pub fn format_worst_performers(rows: &[&ScoredStock]) -> String {
    let mut out = String::new();
    out.push_str("Worst performers (year-start to YTD low):\n");
    if rows.is_empty() {
        out.push_str("  (none)\n");
        return out;
    }
    for (i, s) in rows.iter().enumerate() {
        let Some(d) = &s.detail else { continue };
        push_line(
            &mut out,
            format!(
                "  {:>2}. [{}] {:<20} {:>8.1}%  low {:.1} on {}  now {:.1}",
                i + 1,
                s.metrics.code,
                truncate(&s.listing.name, 20),
                d.low_decline_pct,
                s.metrics.ytd_low,
                d.ytd_low_date,
                s.metrics.current_price,
            ),
        );
    }
    out
}

pub fn format_low_summary(summary: &LowSummary) -> String {
    let mut out = String::new();
    out.push_str("Summary:\n");
    out.push_str(&format!("  stocks: {}\n", summary.count));
    out.push_str(&format!(
        "  decline to low: mean {} | min {} | max {}\n",
        fmt_pct(summary.mean_decline_pct),
        fmt_pct(summary.min_decline_pct),
        fmt_pct(summary.max_decline_pct)
    ));
    out.push_str(&format!("  mean recovery from low: {}\n", fmt_pct(summary.mean_recovery_pct)));
    out.push_str(&format!("  mean score: {}\n", fmt_opt(summary.mean_score, 1)));
    out.push_str(&format_distribution("Sectors", &summary.sectors));
    out.push_str(&format_distribution("Markets", &summary.markets));
    out
}

/// Skipped stocks with reasons. Empty string when nothing was skipped.
pub fn format_skipped(skipped: &[SkippedStock]) -> String {
    if skipped.is_empty() {
        return String::new();
    }
    let mut out = format!("Skipped ({}):\n", skipped.len());
    for s in skipped {
        push_line(&mut out, format!("  [{}] {} - {}", s.code, s.name, s.reason));
    }
    out
}

pub fn format_high_table(rows: &[HighStock]) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:>4} {:<6} {:<20} {:<8} {:>9} {:>9} {:>10} {:>9} {:>9} {:<18}",
            "rank", "code", "name", "market", "price", "ytd high", "high date", "ytd ret", "high ret", "sector"
        ),
    );
    push_line(
        &mut out,
        format!(
            "{:-<4} {:-<6} {:-<20} {:-<8} {:-<9} {:-<9} {:-<10} {:-<9} {:-<9} {:-<18}",
            "", "", "", "", "", "", "", "", "", ""
        ),
    );
    for (i, s) in rows.iter().enumerate() {
        let m = &s.metrics;
        push_line(
            &mut out,
            format!(
                "{:>4} {:<6} {:<20} {:<8} {:>9.1} {:>9.1} {:>10} {:>9} {:>9} {:<18}",
                i + 1,
                truncate(&m.code, 6),
                truncate(&s.listing.name, 20),
                truncate(s.listing.market_label(), 8),
                m.current_price,
                m.ytd_high,
                m.ytd_high_date.to_string(),
                format!("{:+.1}%", m.ytd_return_pct),
                format!("{:+.1}%", m.high_return_pct),
                truncate(s.fundamentals.sector.as_deref().unwrap_or("-"), 18),
            ),
        );
    }
    out
}

pub fn format_high_summary(summary: &HighSummary) -> String {
    let mut out = String::new();
    out.push_str("Summary:\n");
    out.push_str(&format!("  stocks: {}\n", summary.count));
    out.push_str(&format!(
        "  ytd return: mean {} | max {} | min {}\n",
        fmt_pct(summary.mean_return_pct),
        fmt_pct(summary.max_return_pct),
        fmt_pct(summary.min_return_pct)
    ));
    out.push_str(&format_distribution("Sectors", &summary.sectors));
    out.push_str(&format_distribution("Markets", &summary.markets));
    out
}

/// Plain listing: the first rows, market shares, and volume stats when present.
pub fn format_listing(kind: ListingKind, rows: &[StockListing], summary: &ListingSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== ytd - {} ranking ===\n", kind.display_name()));
    out.push_str(&format!("Rows: {}\n\n", summary.count));

    for row in rows.iter().take(LISTING_PREVIEW) {
        let extra = if row.columns.is_empty() {
            String::new()
        } else {
            format!("  {}", row.columns.join(" | "))
        };
        push_line(
            &mut out,
            format!(
                "{:>4}. [{}] {} ({}){extra}",
                row.rank,
                row.code,
                row.name,
                row.market_label()
            ),
        );
    }
    if rows.len() > LISTING_PREVIEW {
        out.push_str(&format!("  ... {} more\n", rows.len() - LISTING_PREVIEW));
    }

    if !summary.markets.is_empty() {
        out.push_str("\nMarkets:\n");
        for (market, n, pct) in &summary.markets {
            out.push_str(&format!("  {market}: {n} ({pct:.1}%)\n"));
        }
    }
    if let Some(v) = &summary.volume {
        out.push_str("\nVolume:\n");
        out.push_str(&format!("  mean: {:.0}\n", v.mean));
        out.push_str(&format!("  max : {}\n", v.max));
        out.push_str(&format!("  min : {}\n", v.min));
        out.push_str(&format!("  rows: {}\n", v.sample_size));
    }
    out
}

fn format_distribution(title: &str, entries: &[(String, usize)]) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = entries.iter().map(|(k, n)| format!("{k} ({n})")).collect();
    format!("  {title}: {}\n", parts.join(", "))
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Fixed-decimal value or `-` when missing.
pub fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.decimals$}"),
        _ => "-".to_string(),
    }
}

pub fn fmt_pct(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.1}%"),
        _ => "-".to_string(),
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Factor, FactorCategory, Fundamentals, Grade, ScoreResult, StockMetrics};

    fn stock() -> ScoredStock {
        ScoredStock {
            listing: StockListing {
                rank: 1,
                code: "7203".to_string(),
                name: "Toyota".to_string(),
                market: None,
                url: String::new(),
                columns: Vec::new(),
            },
            fundamentals: Fundamentals::default(),
            metrics: StockMetrics {
                code: "7203".to_string(),
                current_price: 2500.0,
                ytd_low: 2000.0,
                recovery_from_low_pct: 25.0,
                pe_ratio: None,
                pb_ratio: Some(0.9),
                dividend_yield_pct: 0.0,
                sma_20: None,
                sma_50: None,
                volatility_pct: Some(40.0),
                max_drawdown_pct: Some(20.0),
            },
            detail: None,
            score: ScoreResult {
                score: 100,
                raw_total: 105,
                factors: vec![
                    Factor {
                        category: FactorCategory::Base,
                        label: "base".to_string(),
                        points: 50,
                    },
                    Factor {
                        category: FactorCategory::Recovery,
                        label: "recovery >= 20%".to_string(),
                        points: 20,
                    },
                ],
                grade: Grade::Strong,
            },
            history: Vec::new(),
        }
    }

    #[test]
    fn missing_values_render_as_dash() {
        let s = stock();
        let table = format_recovery_table(&[&s]);
        let row = table.lines().nth(2).unwrap();
        assert!(row.contains("7203"));
        assert!(row.contains("unknown"));
        assert!(row.contains("0.90"));
        assert!(row.split_whitespace().any(|c| c == "-"));
    }

    #[test]
    fn breakdown_lists_factors_and_clamp() {
        let text = format_factor_breakdown(&stock());
        assert!(text.contains("+50"));
        assert!(text.contains("recovery >= 20%"));
        assert!(text.contains("raw total 105 (clamped)"));
    }

    #[test]
    fn skipped_section_is_empty_without_skips() {
        assert_eq!(format_skipped(&[]), "");
        let text = format_skipped(&[SkippedStock {
            code: "1234".to_string(),
            name: "X".to_string(),
            reason: "empty price history".to_string(),
        }]);
        assert!(text.contains("Skipped (1)"));
        assert!(text.contains("empty price history"));
    }

    #[test]
    fn filter_description() {
        let f = RecoveryFilter {
            min_score: Some(70),
            max_pb_ratio: Some(1.5),
            ..RecoveryFilter::default()
        };
        assert_eq!(describe_recovery_filter(&f), "score>=70 & pbr<=1.5");
        assert_eq!(describe_recovery_filter(&RecoveryFilter::default()), "none");
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
