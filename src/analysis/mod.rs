//! Derive per-stock metrics from price history and fundamentals.
//!
//! The YTD window is the set of bars dated on or after January 1st of the
//! latest bar's year; moving averages, volatility and drawdown use the whole
//! observation window (the fetched history, about one year).

use chrono::{Datelike, NaiveDate};

use crate::domain::{Fundamentals, HighMetrics, LowDetail, PriceBar, StockMetrics};
use crate::error::AppError;
use crate::math::{annualized_volatility_pct, max_drawdown_pct, pct_change, sma};

pub const SMA_SHORT: usize = 20;
pub const SMA_LONG: usize = 50;

/// Price levels shared by the YTD-low and YTD-high analyses.
#[derive(Debug, Clone, PartialEq)]
pub struct YtdSummary {
    pub current_price: f64,
    pub ytd_low: f64,
    pub ytd_low_date: NaiveDate,
    pub ytd_high: f64,
    pub ytd_high_date: NaiveDate,
    pub year_start_price: f64,
}

/// Drop bars with non-finite or non-positive prices and sort by date.
pub fn clean_history(history: &[PriceBar]) -> Vec<PriceBar> {
    let mut bars: Vec<PriceBar> = history
        .iter()
        .filter(|b| {
            [b.open, b.high, b.low, b.close]
                .iter()
                .all(|v| v.is_finite() && *v > 0.0)
        })
        .copied()
        .collect();
    bars.sort_by_key(|b| b.date);
    bars
}

/// Summarize the YTD window of a cleaned, date-sorted history.
pub fn ytd_summary(bars: &[PriceBar]) -> Option<YtdSummary> {
    let last = bars.last()?;
    let year_start = NaiveDate::from_ymd_opt(last.date.year(), 1, 1)?;

    let ytd: Vec<&PriceBar> = bars.iter().filter(|b| b.date >= year_start).collect();
    let window: Vec<&PriceBar> = if ytd.is_empty() { bars.iter().collect() } else { ytd };

    let first = window.first()?;
    let mut low = first;
    let mut high = first;
    for b in &window {
        if b.low < low.low {
            low = b;
        }
        if b.high > high.high {
            high = b;
        }
    }

    Some(YtdSummary {
        current_price: last.close,
        ytd_low: low.low,
        ytd_low_date: low.date,
        ytd_high: high.high,
        ytd_high_date: high.date,
        year_start_price: first.close,
    })
}

/// Build the recovery-score input and the YTD detail for one stock.
pub fn build_low_metrics(
    code: &str,
    history: &[PriceBar],
    fundamentals: &Fundamentals,
) -> Result<(StockMetrics, LowDetail), AppError> {
    let bars = clean_history(history);
    let summary = ytd_summary(&bars)
        .ok_or_else(|| AppError::new(3, format!("No usable price history for {code}.")))?;

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let recovery_from_low_pct = pct_change(summary.ytd_low, summary.current_price)
        .ok_or_else(|| AppError::new(3, format!("Invalid YTD low for {code}.")))?;

    let metrics = StockMetrics {
        code: code.to_string(),
        current_price: summary.current_price,
        ytd_low: summary.ytd_low,
        recovery_from_low_pct,
        pe_ratio: positive(fundamentals.pe_ratio),
        pb_ratio: positive(fundamentals.pb_ratio),
        dividend_yield_pct: fundamentals.dividend_yield_pct.filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(0.0),
        sma_20: sma(&closes, SMA_SHORT),
        sma_50: sma(&closes, SMA_LONG),
        volatility_pct: annualized_volatility_pct(&closes),
        max_drawdown_pct: (closes.len() >= 2).then(|| max_drawdown_pct(&closes)),
    };

    let detail = LowDetail {
        ytd_low_date: summary.ytd_low_date,
        ytd_high: summary.ytd_high,
        ytd_high_date: summary.ytd_high_date,
        year_start_price: summary.year_start_price,
        ytd_return_pct: pct_change(summary.year_start_price, summary.current_price).unwrap_or(0.0),
        low_decline_pct: pct_change(summary.year_start_price, summary.ytd_low).unwrap_or(0.0),
    };

    Ok((metrics, detail))
}

/// Build the YTD-high performance figures for one stock.
pub fn build_high_metrics(code: &str, history: &[PriceBar]) -> Result<HighMetrics, AppError> {
    let bars = clean_history(history);
    let summary = ytd_summary(&bars)
        .ok_or_else(|| AppError::new(3, format!("No usable price history for {code}.")))?;

    let ytd_return_pct = pct_change(summary.year_start_price, summary.current_price)
        .ok_or_else(|| AppError::new(3, format!("Invalid year-start price for {code}.")))?;
    let high_return_pct = pct_change(summary.year_start_price, summary.ytd_high)
        .ok_or_else(|| AppError::new(3, format!("Invalid year-start price for {code}.")))?;

    Ok(HighMetrics {
        code: code.to_string(),
        current_price: summary.current_price,
        ytd_high: summary.ytd_high,
        ytd_high_date: summary.ytd_high_date,
        ytd_low: summary.ytd_low,
        ytd_low_date: summary.ytd_low_date,
        year_start_price: summary.year_start_price,
        ytd_return_pct,
        high_return_pct,
    })
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: NaiveDate, close: f64) -> PriceBar {
        PriceBar {
            date,
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1_000,
        }
    }

    fn history(start: NaiveDate, closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| bar(start + chrono::Duration::days(i as i64), c))
            .collect()
    }

    #[test]
    fn ytd_window_starts_on_january_first() {
        let start = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        // 2024-12-30, 2024-12-31 are outside the YTD window.
        let bars = history(start, &[50.0, 60.0, 100.0, 90.0, 95.0]);
        let s = ytd_summary(&bars).unwrap();
        assert_eq!(s.year_start_price, 100.0);
        assert_eq!(s.current_price, 95.0);
        assert!((s.ytd_low - 90.0 * 0.99).abs() < 1e-9);
        assert_eq!(s.ytd_low_date, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
    }

    #[test]
    fn short_history_leaves_moving_averages_null() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let bars = history(start, &[100.0, 98.0, 97.0, 99.0, 101.0]);
        let (m, _) = build_low_metrics("1234", &bars, &Fundamentals::default()).unwrap();
        assert_eq!(m.sma_20, None);
        assert_eq!(m.sma_50, None);
        assert_eq!(m.pb_ratio, None);
        assert_eq!(m.dividend_yield_pct, 0.0);
    }

    #[test]
    fn low_metrics_compute_recovery_and_decline() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut closes = vec![100.0; 10];
        closes.extend([80.0, 85.0, 90.0]);
        let bars = history(start, &closes);
        let fundamentals = Fundamentals {
            pb_ratio: Some(0.8),
            pe_ratio: Some(-3.0),
            dividend_yield_pct: Some(3.5),
            ..Fundamentals::default()
        };

        let (m, d) = build_low_metrics("1234", &bars, &fundamentals).unwrap();
        let low = 80.0 * 0.99;
        assert!((m.ytd_low - low).abs() < 1e-9);
        assert!((m.recovery_from_low_pct - (90.0 - low) / low * 100.0).abs() < 1e-9);
        assert!((d.low_decline_pct - (low - 100.0)).abs() < 1e-9);
        assert!((m.max_drawdown_pct.unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(m.pb_ratio, Some(0.8));
        assert_eq!(m.pe_ratio, None);
        assert_eq!(m.dividend_yield_pct, 3.5);
    }

    #[test]
    fn two_bar_history_has_no_volatility_to_score() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let bars = history(start, &[100.0, 110.0]);
        let (m, _) = build_low_metrics("1234", &bars, &Fundamentals::default()).unwrap();
        assert_eq!(m.volatility_pct, None);
        assert_eq!(m.max_drawdown_pct, Some(0.0));

        let result = crate::score::score(&m).unwrap();
        assert!(result
            .factors
            .iter()
            .all(|f| f.category != crate::domain::FactorCategory::Volatility));
    }

    #[test]
    fn single_bar_history_has_no_drawdown() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let (m, _) = build_low_metrics("1234", &history(start, &[100.0]), &Fundamentals::default()).unwrap();
        assert_eq!(m.volatility_pct, None);
        assert_eq!(m.max_drawdown_pct, None);
    }

    #[test]
    fn empty_history_is_an_error() {
        assert!(build_low_metrics("1234", &[], &Fundamentals::default()).is_err());
        assert!(build_high_metrics("1234", &[]).is_err());
    }

    #[test]
    fn high_metrics_returns() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let bars = history(start, &[100.0, 120.0, 110.0]);
        let h = build_high_metrics("1234", &bars).unwrap();
        assert!((h.ytd_return_pct - 10.0).abs() < 1e-9);
        assert!((h.high_return_pct - 21.2).abs() < 1e-9);
    }
}
