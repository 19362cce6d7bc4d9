//! Export ranked results to CSV.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream
//! scripts: one header row, empty fields for unknown values.

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::domain::{HighStock, ScoredStock, StockListing};
use crate::error::AppError;
use crate::io::ensure_parent_dir;

pub const RECOVERY_HEADER: [&str; 13] = [
    "rank",
    "stock_code",
    "stock_name",
    "market",
    "recovery_from_low_pct",
    "recovery_score",
    "max_drawdown_pct",
    "volatility_pct",
    "sma_20",
    "sma_50",
    "pe_ratio",
    "pb_ratio",
    "dividend_yield",
];

pub const HIGH_HEADER: [&str; 13] = [
    "rank",
    "stock_code",
    "stock_name",
    "market",
    "current_price",
    "ytd_high",
    "ytd_high_date",
    "ytd_low",
    "year_start_price",
    "ytd_return_pct",
    "high_return_pct",
    "sector",
    "market_cap",
];

pub const LISTING_HEADER: [&str; 6] = ["rank", "stock_code", "stock_name", "market", "url", "columns"];

/// Write ranked recovery results. `rank` is the 1-based position in `rows`.
pub fn write_recovery_csv(path: &Path, rows: &[&ScoredStock]) -> Result<(), AppError> {
    let mut w = open_writer(path)?;
    write_row(&mut w, RECOVERY_HEADER.iter().map(|s| s.to_string()))?;
    for (i, s) in rows.iter().enumerate() {
        let m = &s.metrics;
        write_row(
            &mut w,
            [
                (i + 1).to_string(),
                m.code.clone(),
                s.listing.name.clone(),
                s.listing.market.clone().unwrap_or_default(),
                fmt2(m.recovery_from_low_pct),
                s.score.score.to_string(),
                opt2(m.max_drawdown_pct),
                opt2(m.volatility_pct),
                opt2(m.sma_20),
                opt2(m.sma_50),
                opt2(m.pe_ratio),
                opt2(m.pb_ratio),
                opt2(s.fundamentals.dividend_yield_pct),
            ],
        )?;
    }
    finish(w, path)
}

pub fn write_high_csv(path: &Path, rows: &[HighStock]) -> Result<(), AppError> {
    let mut w = open_writer(path)?;
    write_row(&mut w, HIGH_HEADER.iter().map(|s| s.to_string()))?;
    for (i, s) in rows.iter().enumerate() {
        let m = &s.metrics;
        write_row(
            &mut w,
            [
                (i + 1).to_string(),
                m.code.clone(),
                s.listing.name.clone(),
                s.listing.market.clone().unwrap_or_default(),
                fmt2(m.current_price),
                fmt2(m.ytd_high),
                m.ytd_high_date.to_string(),
                fmt2(m.ytd_low),
                fmt2(m.year_start_price),
                fmt2(m.ytd_return_pct),
                fmt2(m.high_return_pct),
                s.fundamentals.sector.clone().unwrap_or_default(),
                s.fundamentals.market_cap.map(|v| format!("{v:.0}")).unwrap_or_default(),
            ],
        )?;
    }
    finish(w, path)
}

/// Plain listing rows; the page's extra cells are joined with `|`.
pub fn write_listing_csv(path: &Path, rows: &[StockListing]) -> Result<(), AppError> {
    let mut w = open_writer(path)?;
    write_row(&mut w, LISTING_HEADER.iter().map(|s| s.to_string()))?;
    for r in rows {
        write_row(
            &mut w,
            [
                r.rank.to_string(),
                r.code.clone(),
                r.name.clone(),
                r.market.clone().unwrap_or_default(),
                r.url.clone(),
                r.columns.join("|"),
            ],
        )?;
    }
    finish(w, path)
}

fn open_writer(path: &Path) -> Result<Writer<File>, AppError> {
    ensure_parent_dir(path)?;
    Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))
}

fn write_row<I>(w: &mut Writer<File>, fields: I) -> Result<(), AppError>
where
    I: IntoIterator<Item = String>,
{
    w.write_record(fields)
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))
}

fn finish(mut w: Writer<File>, path: &Path) -> Result<(), AppError> {
    w.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV '{}': {e}", path.display())))
}

fn fmt2(v: f64) -> String {
    if v.is_finite() { format!("{v:.2}") } else { String::new() }
}

fn opt2(v: Option<f64>) -> String {
    v.map(fmt2).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Fundamentals, Grade, ScoreResult, StockMetrics};

    fn stock(code: &str, score: u8) -> ScoredStock {
        ScoredStock {
            listing: StockListing {
                rank: 3,
                code: code.to_string(),
                name: "Name, Inc".to_string(),
                market: Some("東証PRM".to_string()),
                url: String::new(),
                columns: Vec::new(),
            },
            fundamentals: Fundamentals {
                dividend_yield_pct: Some(3.456),
                ..Fundamentals::default()
            },
            metrics: StockMetrics {
                code: code.to_string(),
                current_price: 110.0,
                ytd_low: 100.0,
                recovery_from_low_pct: 10.0,
                pe_ratio: None,
                pb_ratio: Some(0.8),
                dividend_yield_pct: 3.456,
                sma_20: Some(105.123),
                sma_50: None,
                volatility_pct: Some(25.0),
                max_drawdown_pct: Some(33.333),
            },
            detail: None,
            score: ScoreResult {
                score,
                raw_total: score as u32,
                factors: Vec::new(),
                grade: Grade::from_score(score),
            },
            history: Vec::new(),
        }
    }

    #[test]
    fn recovery_csv_header_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/ranking.csv");
        let a = stock("1111", 80);
        let b = stock("2222", 65);
        write_recovery_csv(&path, &[&a, &b]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "rank,stock_code,stock_name,market,recovery_from_low_pct,recovery_score,max_drawdown_pct,volatility_pct,sma_20,sma_50,pe_ratio,pb_ratio,dividend_yield"
        );
        assert_eq!(
            lines.next().unwrap(),
            "1,1111,\"Name, Inc\",東証PRM,10.00,80,33.33,25.00,105.12,,,0.80,3.46"
        );
        assert!(lines.next().unwrap().starts_with("2,2222,"));
    }

    #[test]
    fn listing_csv_joins_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stop.csv");
        let row = StockListing {
            rank: 1,
            code: "3001".to_string(),
            name: "X".to_string(),
            market: None,
            url: "https://example.invalid/q".to_string(),
            columns: vec!["500".into(), "+80".into(), "+19.05".into()],
        };
        write_listing_csv(&path, &[row]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().nth(1).unwrap(), "1,3001,X,,https://example.invalid/q,500|+80|+19.05");
    }
}
