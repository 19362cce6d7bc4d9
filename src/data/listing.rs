//! Ranking page parsing.
//!
//! Pages embed the ranking as a JSON object (`mainRankingList`); older and
//! server-rendered pages only carry an HTML table. JSON is tried first.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::StockListing;

pub const SITE_ROOT: &str = "https://finance.yahoo.co.jp";

const ROW_SELECTORS: [&str; 5] = [
    r#"div[data-module="RankingResult"] table tr"#,
    "table.rankingTable tr",
    "table tr",
    "div.RankingResult table tr",
    "[data-ranking] tr",
];

static JSON_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:window\.mainRankingList\s*=\s*|"mainRankingList"\s*:\s*)\{"#).expect("static regex")
});
static HREF_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"code=([^&]+)|/quote/([^/?]+)").expect("static regex"));
static TEXT_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").expect("static regex"));

/// Parse a ranking page, JSON block first, HTML table second.
pub fn parse_listing_page(html: &str) -> Vec<StockListing> {
    if let Some(rows) = parse_json_block(html) {
        debug!(rows = rows.len(), "parsed ranking from embedded JSON");
        return rows;
    }
    let rows = parse_html_table(html);
    debug!(rows = rows.len(), "parsed ranking from HTML table");
    rows
}

#[derive(Debug, Deserialize)]
struct RankingList {
    #[serde(default)]
    results: Vec<RankingEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RankingEntry {
    #[serde(default)]
    stock_code: Value,
    #[serde(default)]
    stock_name: Value,
    #[serde(default)]
    market_name: Value,
    #[serde(default)]
    save_price: Value,
    #[serde(default)]
    ranking_result: Option<RankingResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RankingResult {
    #[serde(default)]
    stop_price: Option<StopPrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopPrice {
    #[serde(default)]
    change_price: Value,
    #[serde(default)]
    change_price_rate: Value,
}

/// `None` when the page has no parseable JSON block.
pub fn parse_json_block(html: &str) -> Option<Vec<StockListing>> {
    let m = JSON_START.find(html)?;
    let raw = balanced_object(&html[m.end() - 1..])?;
    let list: RankingList = match serde_json::from_str(raw) {
        Ok(list) => list,
        Err(e) => {
            debug!(error = %e, "mainRankingList block is not valid JSON");
            return None;
        }
    };

    let rows = list
        .results
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let code = value_text(&entry.stock_code)?;
            let mut columns = Vec::new();
            if let Some(price) = value_text(&entry.save_price) {
                columns.push(price);
            }
            if let Some(stop) = entry.ranking_result.and_then(|r| r.stop_price) {
                columns.extend(value_text(&stop.change_price));
                columns.extend(value_text(&stop.change_price_rate));
            }
            Some(StockListing {
                rank: i as u32 + 1,
                url: format!("{SITE_ROOT}/quote/{code}"),
                name: value_text(&entry.stock_name).unwrap_or_default(),
                market: value_text(&entry.market_name),
                code,
                columns,
            })
        })
        .collect();
    Some(rows)
}

/// Slice out the JSON object starting at `text[0] == '{'`.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn value_text(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// Parse the first table whose selector yields more than one row.
pub fn parse_html_table(html: &str) -> Vec<StockListing> {
    let doc = Html::parse_document(html);
    let Ok(cell_sel) = Selector::parse("td, th") else {
        return Vec::new();
    };

    for css in ROW_SELECTORS {
        let Ok(sel) = Selector::parse(css) else {
            continue;
        };
        let rows: Vec<ElementRef> = doc.select(&sel).collect();
        if rows.len() <= 1 {
            continue;
        }
        debug!(selector = css, rows = rows.len(), "matched ranking rows");
        return rows
            .iter()
            .skip(1)
            .enumerate()
            .filter_map(|(i, row)| {
                let parsed = parse_row(row, &cell_sel);
                if parsed.is_none() {
                    debug!(row = i + 1, "skipping unparseable ranking row");
                }
                parsed
            })
            .collect();
    }
    Vec::new()
}

fn parse_row(row: &ElementRef, cell_sel: &Selector) -> Option<StockListing> {
    let cells: Vec<ElementRef> = row.select(cell_sel).collect();
    if cells.len() < 3 {
        return None;
    }

    let rank: u32 = element_text(&cells[0]).replace('.', "").parse().ok()?;

    let stock_cell = &cells[1];
    let link = first_child(stock_cell, "a")?;
    let name = element_text(&link);
    let href = link.value().attr("href").unwrap_or("");
    let code = extract_code(href, &element_text(stock_cell), rank);
    let market = first_child(stock_cell, "span")
        .map(|s| element_text(&s))
        .filter(|s| !s.is_empty());
    let url = if href.starts_with('/') {
        format!("{SITE_ROOT}{href}")
    } else {
        href.to_string()
    };
    let columns = cells[2..].iter().map(element_text).collect();

    Some(StockListing {
        rank,
        code,
        name,
        market,
        url,
        columns,
    })
}

/// Stock code from the link, then from the cell text, else `UNKNOWN_{rank}`.
pub fn extract_code(href: &str, cell_text: &str, rank: u32) -> String {
    if let Some(caps) = HREF_CODE.captures(href) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            let code = m.as_str();
            return code.strip_suffix(".T").unwrap_or(code).to_string();
        }
    }
    if let Some(m) = TEXT_CODE.find(cell_text) {
        return m.as_str().to_string();
    }
    format!("UNKNOWN_{rank}")
}

fn first_child<'a>(el: &ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(tag).ok()?;
    el.select(&sel).next()
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_PAGE: &str = r#"<html><script>
        window.mainRankingList = {
            "results": [
                {"stockCode": "1234", "stockName": "Test {Holdings}", "marketName": "東証PRM", "savePrice": "1,000"},
                {"stockCode": 5678, "stockName": "Other", "marketName": "東証STD", "savePrice": 250.5,
                 "rankingResult": {"stopPrice": {"changePrice": "+80", "changePriceRate": "+32.00"}}}
            ]
        };
        </script></html>"#;

    const TABLE_PAGE: &str = r#"<html><body>
        <table class="rankingTable">
          <tr><th>順位</th><th>名称</th><th>取引値</th><th>出来高</th></tr>
          <tr><td>1</td><td><a href="/quote/7203.T">トヨタ自動車</a><span>東証PRM</span></td><td>2,500</td><td>1,200,000</td></tr>
          <tr><td>2.</td><td><a href="/stocks?code=6758.T&x=1">ソニーG</a></td><td>3,100</td><td>900</td></tr>
          <tr><td>3</td><td><a href="/news">9984 ソフトバンクG</a></td><td>8,000</td><td>50</td></tr>
          <tr><td>-</td><td><a href="/quote/1111">bad rank</a></td><td>1</td></tr>
          <tr><td>5</td><td>no link</td><td>1</td></tr>
        </table>
        </body></html>"#;

    #[test]
    fn parses_embedded_json_block() {
        let rows = parse_json_block(JSON_PAGE).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].code, "1234");
        assert_eq!(rows[0].name, "Test {Holdings}");
        assert_eq!(rows[0].market.as_deref(), Some("東証PRM"));
        assert_eq!(rows[0].url, "https://finance.yahoo.co.jp/quote/1234");
        assert_eq!(rows[1].code, "5678");
        assert_eq!(rows[1].columns, vec!["250.5", "+80", "+32.00"]);
    }

    #[test]
    fn missing_json_block_falls_back_to_table() {
        assert!(parse_json_block(TABLE_PAGE).is_none());
        let rows = parse_listing_page(TABLE_PAGE);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn parses_table_rows() {
        let rows = parse_html_table(TABLE_PAGE);
        let codes: Vec<&str> = rows.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["7203", "6758", "9984"]);

        assert_eq!(rows[0].name, "トヨタ自動車");
        assert_eq!(rows[0].market.as_deref(), Some("東証PRM"));
        assert_eq!(rows[0].url, "https://finance.yahoo.co.jp/quote/7203.T");
        assert_eq!(rows[0].columns, vec!["2,500", "1,200,000"]);

        assert_eq!(rows[1].rank, 2);
        assert_eq!(rows[1].market, None);
        assert_eq!(rows[1].market_label(), "unknown");
    }

    #[test]
    fn code_extraction_fallbacks() {
        assert_eq!(extract_code("/quote/7203.T", "", 1), "7203");
        assert_eq!(extract_code("/x?code=6758.T&y=2", "", 1), "6758");
        assert_eq!(extract_code("/news", "8306 三菱UFJ", 1), "8306");
        assert_eq!(extract_code("", "名前だけ", 7), "UNKNOWN_7");
    }

    #[test]
    fn empty_page_yields_no_rows() {
        assert!(parse_listing_page("<html><body>nothing</body></html>").is_empty());
    }
}
