//! Offline metrics CSV ingest.
//!
//! Turns a hand-made or exported metrics CSV into scoring inputs:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - null markers (`""`, `N/A`, `-`) become `None`, never zero

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Fundamentals, StockListing, StockMetrics};
use crate::error::AppError;
use crate::math::pct_change;

const REQUIRED: [&str; 3] = ["stock_code", "current_price", "ytd_low"];

/// One usable CSV row.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedRow {
    pub listing: StockListing,
    pub fundamentals: Fundamentals,
    pub metrics: StockMetrics,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct IngestedMetrics {
    pub rows: Vec<IngestedRow>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load a metrics CSV.
pub fn load_metrics_csv(path: &Path) -> Result<IngestedMetrics, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_metrics(file)
}

pub fn read_metrics<R: std::io::Read>(input: R) -> Result<IngestedMetrics, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    for name in REQUIRED {
        if !header_map.contains_key(name) {
            return Err(AppError::new(2, format!("Missing required column: `{name}`")));
        }
    }

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Line 1 is the header.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    code: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map, rows.len() as u32 + 1) {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError {
                line,
                code: get_optional(&record, &header_map, "stock_code").map(str::to_string),
                message,
            }),
        }
    }

    if rows.is_empty() {
        return Err(AppError::new(3, "No valid rows in metrics CSV."));
    }

    Ok(IngestedMetrics {
        rows,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>, rank: u32) -> Result<IngestedRow, String> {
    let code = get_required(record, header_map, "stock_code")?.to_string();
    let current_price = parse_required_f64(record, header_map, "current_price")?;
    let ytd_low = parse_required_f64(record, header_map, "ytd_low")?;

    let recovery_from_low_pct = match parse_opt_f64(record, header_map, "recovery_from_low_pct")? {
        Some(v) => v,
        None => pct_change(ytd_low, current_price)
            .ok_or_else(|| "Cannot compute recovery: `ytd_low` must be > 0.".to_string())?,
    };
    let dividend = parse_opt_f64(record, header_map, "dividend_yield")?;
    let pe_ratio = parse_opt_f64(record, header_map, "pe_ratio")?;
    let pb_ratio = parse_opt_f64(record, header_map, "pb_ratio")?;

    let name = get_optional(record, header_map, "stock_name").unwrap_or_default().to_string();
    let market = get_optional(record, header_map, "market").map(str::to_string);
    let sector = get_optional(record, header_map, "sector").map(str::to_string);

    let metrics = StockMetrics {
        code: code.clone(),
        current_price,
        ytd_low,
        recovery_from_low_pct,
        pe_ratio,
        pb_ratio,
        dividend_yield_pct: dividend.unwrap_or(0.0),
        sma_20: parse_opt_f64(record, header_map, "sma_20")?,
        sma_50: parse_opt_f64(record, header_map, "sma_50")?,
        volatility_pct: parse_opt_f64(record, header_map, "volatility_pct")?,
        max_drawdown_pct: parse_opt_f64(record, header_map, "max_drawdown_pct")?,
    };

    Ok(IngestedRow {
        listing: StockListing {
            rank,
            code,
            name: name.clone(),
            market,
            url: String::new(),
            columns: Vec::new(),
        },
        fundamentals: Fundamentals {
            long_name: (!name.is_empty()).then_some(name),
            sector,
            pe_ratio,
            pb_ratio,
            dividend_yield_pct: dividend,
            ..Fundamentals::default()
        },
        metrics,
    })
}

fn is_null_marker(s: &str) -> bool {
    s.is_empty() || s == "-" || s.eq_ignore_ascii_case("n/a")
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    get_optional(record, header_map, name).ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !is_null_marker(s))
}

fn parse_required_f64(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<f64, String> {
    let raw = get_required(record, header_map, name)?;
    parse_number(raw).ok_or_else(|| format!("Invalid `{name}` value '{raw}'."))
}

/// Absent or null-marked cells are `Ok(None)`; unparseable text is an error.
fn parse_opt_f64(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<Option<f64>, String> {
    match get_optional(record, header_map, name) {
        None => Ok(None),
        Some(raw) => parse_number(raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid `{name}` value '{raw}'.")),
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '%').collect();
    let v = cleaned.trim().parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rows_with_null_markers() {
        let csv = "\u{feff}Stock_Code,stock_name,current_price,ytd_low,pb_ratio,pe_ratio,dividend_yield,sma_20,sma_50\n\
                   7203,Toyota,\"2,500\",2000,N/A,-,,2400,2300\n\
                   6758,Sony,3100,3000,0.9,12,3.1,,\n";
        let data = read_metrics(csv.as_bytes()).unwrap();
        assert_eq!(data.rows_read, 2);
        assert!(data.row_errors.is_empty());

        let toyota = &data.rows[0].metrics;
        assert_eq!(toyota.current_price, 2500.0);
        assert_eq!(toyota.pb_ratio, None);
        assert_eq!(toyota.pe_ratio, None);
        assert_eq!(toyota.dividend_yield_pct, 0.0);
        assert!((toyota.recovery_from_low_pct - 25.0).abs() < 1e-9);
        assert_eq!(toyota.volatility_pct, None);
        assert_eq!(toyota.max_drawdown_pct, None);

        let sony = &data.rows[1];
        assert_eq!(sony.listing.rank, 2);
        assert_eq!(sony.metrics.pb_ratio, Some(0.9));
        assert_eq!(sony.fundamentals.dividend_yield_pct, Some(3.1));
        assert_eq!(sony.metrics.sma_20, None);
    }

    #[test]
    fn missing_volatility_is_left_unknown_and_unscored() {
        let data = read_metrics("stock_code,current_price,ytd_low\n7203,100,100\n".as_bytes()).unwrap();
        let m = &data.rows[0].metrics;
        assert_eq!(m.volatility_pct, None);
        assert_eq!(m.max_drawdown_pct, None);

        let result = crate::score::score(m).unwrap();
        assert_eq!(result.score, 50);
        assert_eq!(result.factors.len(), 1);
    }

    #[test]
    fn bad_rows_are_collected() {
        let csv = "stock_code,current_price,ytd_low\n\
                   1111,abc,100\n\
                   2222,,100\n\
                   3333,120,100\n";
        let data = read_metrics(csv.as_bytes()).unwrap();
        assert_eq!(data.rows.len(), 1);
        assert_eq!(data.row_errors.len(), 2);
        assert_eq!(data.row_errors[0].line, 2);
        assert_eq!(data.row_errors[0].code.as_deref(), Some("1111"));
        assert!(data.row_errors[1].message.contains("current_price"));
    }

    #[test]
    fn missing_required_column_is_exit_code_2() {
        let err = read_metrics("stock_code,current_price\n1,2\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn no_usable_rows_is_exit_code_3() {
        let err = read_metrics("stock_code,current_price,ytd_low\n1,x,y\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
