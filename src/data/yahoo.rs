//! Yahoo! Finance integration: ranking pages, daily chart history and
//! quote-summary fundamentals.

use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate};
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::data::listing::{self, SITE_ROOT};
use crate::data::{MarketData, RequestStats, RequestSummary, Throttle};
use crate::domain::{Fundamentals, ListingQuery, PriceBar, StockListing};
use crate::error::AppError;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const SUMMARY_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";
const SUMMARY_MODULES: &str = "price,summaryDetail,defaultKeyStatistics,assetProfile";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Tokyo is UTC+9 all year.
const JST_OFFSET_SECS: i64 = 9 * 3600;

/// Client settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct YahooConfig {
    pub user_agent: String,
    pub page_delay: Duration,
    pub detail_delay: Duration,
    pub timeout: Duration,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_delay: Duration::from_millis(1000),
            detail_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

impl YahooConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();
        let user_agent = lookup("YTD_USER_AGENT")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.user_agent);
        let page_delay = match parse_env_u64(&lookup, "YTD_PAGE_DELAY_MS")? {
            Some(ms) => Duration::from_millis(ms),
            None => defaults.page_delay,
        };
        let detail_delay = match parse_env_u64(&lookup, "YTD_DETAIL_DELAY_MS")? {
            Some(ms) => Duration::from_millis(ms),
            None => defaults.detail_delay,
        };
        let timeout = match parse_env_u64(&lookup, "YTD_HTTP_TIMEOUT_SECS")? {
            Some(0) => return Err(AppError::new(2, "YTD_HTTP_TIMEOUT_SECS must be > 0.")),
            Some(secs) => Duration::from_secs(secs),
            None => defaults.timeout,
        };
        Ok(Self {
            user_agent,
            page_delay,
            detail_delay,
            timeout,
        })
    }
}

fn parse_env_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>, AppError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| AppError::new(2, format!("Invalid {key} value '{raw}' (expected a non-negative integer)."))),
    }
}

pub struct YahooClient {
    client: Client,
    page_throttle: Throttle,
    detail_throttle: Throttle,
    stats: RequestStats,
}

impl YahooClient {
    pub fn from_env() -> Result<Self, AppError> {
        Self::new(YahooConfig::from_env()?)
    }

    pub fn new(config: YahooConfig) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/json;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ja,en-US;q=0.9,en;q=0.8"));
        let agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|_| AppError::new(2, "YTD_USER_AGENT contains invalid header characters."))?;
        headers.insert(USER_AGENT, agent);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to build HTTP client: {e}")))?;

        let page_throttle = Throttle::new(config.page_delay);
        let detail_throttle = Throttle::new(config.detail_delay);
        debug!(
            page_delay_ms = page_throttle.delay().as_millis() as u64,
            detail_delay_ms = detail_throttle.delay().as_millis() as u64,
            "request throttles configured"
        );

        Ok(Self {
            client,
            page_throttle,
            detail_throttle,
            stats: RequestStats::default(),
        })
    }

    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Response, AppError> {
        let started = Instant::now();
        let result = self.client.get(url).query(query).send();
        let elapsed = started.elapsed();

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                self.stats.record(elapsed, false);
                return Err(AppError::new(4, format!("Request to {url} failed: {e}")));
            }
        };

        let ok = resp.status().is_success();
        self.stats.record(elapsed, ok);
        debug!(url, status = %resp.status(), elapsed_ms = elapsed.as_millis() as u64, "request finished");
        if !ok {
            return Err(AppError::new(
                4,
                format!("Request to {url} failed with status {}.", resp.status()),
            ));
        }
        Ok(resp)
    }
}

impl MarketData for YahooClient {
    fn name(&self) -> &str {
        "Yahoo! Finance"
    }

    fn fetch_listing(&self, query: &ListingQuery) -> Result<Vec<StockListing>, AppError> {
        if query.page == 0 {
            return Err(AppError::new(2, "Page number must be >= 1."));
        }
        self.page_throttle.wait();

        let url = format!("{SITE_ROOT}/stocks/ranking/{}", query.kind.slug());
        let page = query.page.to_string();
        let resp = self.get(
            &url,
            &[
                ("market", query.market.as_param()),
                ("term", query.term.as_param()),
                ("page", page.as_str()),
            ],
        )?;
        let html = resp
            .text()
            .map_err(|e| AppError::new(4, format!("Failed to read ranking page: {e}")))?;
        Ok(listing::parse_listing_page(&html))
    }

    fn fetch_history(&self, code: &str) -> Result<Vec<PriceBar>, AppError> {
        self.detail_throttle.wait();

        let url = format!("{CHART_URL}/{code}.T");
        let resp = self.get(&url, &[("range", "1y"), ("interval", "1d")])?;
        let body: ChartResponse = resp
            .json()
            .map_err(|e| AppError::new(4, format!("Failed to parse chart response for {code}: {e}")))?;
        bars_from_chart(code, body)
    }

    fn fetch_fundamentals(&self, code: &str) -> Result<Fundamentals, AppError> {
        self.detail_throttle.wait();

        let url = format!("{SUMMARY_URL}/{code}.T");
        let resp = self.get(&url, &[("modules", SUMMARY_MODULES)])?;
        let body: SummaryResponse = resp
            .json()
            .map_err(|e| AppError::new(4, format!("Failed to parse quote summary for {code}: {e}")))?;
        Ok(fundamentals_from_summary(body))
    }

    fn request_summary(&self) -> Option<RequestSummary> {
        Some(self.stats.summary())
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

fn bars_from_chart(code: &str, body: ChartResponse) -> Result<Vec<PriceBar>, AppError> {
    if let Some(err) = body.chart.error {
        let reason = err.description.unwrap_or_else(|| "unknown error".to_string());
        return Err(AppError::new(4, format!("Chart API error for {code}: {reason}")));
    }
    let result = body
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| AppError::new(4, format!("Chart API returned no result for {code}.")))?;

    let offset = result
        .meta
        .and_then(|m| m.gmtoffset)
        .unwrap_or(JST_OFFSET_SECS);
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let at = |v: &[Option<f64>]| v.get(i).copied().flatten();
        // Days without a close (halts, holidays) are skipped.
        let Some(close) = at(&quote.close) else {
            continue;
        };
        let Some(date) = local_date(ts, offset) else {
            continue;
        };
        bars.push(PriceBar {
            date,
            open: at(&quote.open).unwrap_or(close),
            high: at(&quote.high).unwrap_or(close),
            low: at(&quote.low).unwrap_or(close),
            close,
            volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
        });
    }

    if bars.is_empty() {
        return Err(AppError::new(4, format!("No price history for {code}.")));
    }
    Ok(bars)
}

fn local_date(ts: i64, offset_secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts.checked_add(offset_secs)?, 0).map(|dt| dt.date_naive())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    #[serde(default)]
    result: Option<Vec<SummaryResult>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    #[serde(default)]
    price: Option<PriceModule>,
    #[serde(default)]
    summary_detail: Option<SummaryDetail>,
    #[serde(default)]
    default_key_statistics: Option<KeyStatistics>,
    #[serde(default)]
    asset_profile: Option<AssetProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    market_cap: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    #[serde(default, rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
    #[serde(default)]
    dividend_yield: Option<RawValue>,
    #[serde(default)]
    volume: Option<RawValue>,
    #[serde(default)]
    average_volume: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    #[serde(default)]
    price_to_book: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct AssetProfile {
    #[serde(default)]
    sector: Option<String>,
    #[serde(default)]
    industry: Option<String>,
}

/// `{"raw": 12.3, "fmt": "12.30"}`; empty objects carry no `raw`.
#[derive(Debug, Deserialize)]
struct RawValue {
    #[serde(default)]
    raw: Option<f64>,
}

fn raw(v: &Option<RawValue>) -> Option<f64> {
    v.as_ref().and_then(|r| r.raw).filter(|x| x.is_finite())
}

fn fundamentals_from_summary(body: SummaryResponse) -> Fundamentals {
    let r = body
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .unwrap_or_default();

    let (long_name, market_cap) = match &r.price {
        Some(p) => (p.long_name.clone().or_else(|| p.short_name.clone()), raw(&p.market_cap)),
        None => (None, None),
    };
    let (pe_ratio, dividend_yield_pct, volume, avg_volume) = match &r.summary_detail {
        Some(d) => (
            raw(&d.trailing_pe),
            // Provider reports a fraction (0.032 == 3.2%).
            raw(&d.dividend_yield).map(|y| y * 100.0),
            raw(&d.volume).map(|v| v.max(0.0) as u64),
            raw(&d.average_volume).map(|v| v.max(0.0) as u64),
        ),
        None => (None, None, None, None),
    };
    let pb_ratio = r.default_key_statistics.as_ref().and_then(|k| raw(&k.price_to_book));
    let (sector, industry) = match r.asset_profile {
        Some(a) => (a.sector, a.industry),
        None => (None, None),
    };

    Fundamentals {
        long_name,
        sector,
        industry,
        pe_ratio,
        pb_ratio,
        dividend_yield_pct,
        market_cap,
        volume,
        avg_volume,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn chart_response_maps_to_bars() {
        let json = r#"{"chart":{"result":[{
            "meta":{"gmtoffset":32400},
            "timestamp":[1735776000,1735862400,1735948800],
            "indicators":{"quote":[{
                "open":[100.0,null,102.0],
                "high":[101.0,null,103.0],
                "low":[99.0,null,101.0],
                "close":[100.5,null,102.5],
                "volume":[1000,null,3000]
            }]}
        }],"error":null}}"#;
        let body: ChartResponse = serde_json::from_str(json).unwrap();
        let bars = bars_from_chart("7203", body).unwrap();
        assert_eq!(bars.len(), 2);
        // 2025-01-02T00:00Z is 09:00 in Tokyo.
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(bars[1].close, 102.5);
        assert_eq!(bars[1].volume, 3000);
    }

    #[test]
    fn chart_error_is_reported() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        let body: ChartResponse = serde_json::from_str(json).unwrap();
        let err = bars_from_chart("0000", body).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.message().contains("No data found"));
    }

    #[test]
    fn quote_summary_maps_to_fundamentals() {
        let json = r#"{"quoteSummary":{"result":[{
            "price":{"longName":"Toyota Motor Corporation","marketCap":{"raw":4.2e13,"fmt":"42T"}},
            "summaryDetail":{"trailingPE":{"raw":8.5},"dividendYield":{"raw":0.032},"volume":{"raw":1500000},"averageVolume":{}},
            "defaultKeyStatistics":{"priceToBook":{"raw":0.95}},
            "assetProfile":{"sector":"Consumer Cyclical","industry":"Auto Manufacturers"}
        }],"error":null}}"#;
        let body: SummaryResponse = serde_json::from_str(json).unwrap();
        let f = fundamentals_from_summary(body);
        assert_eq!(f.long_name.as_deref(), Some("Toyota Motor Corporation"));
        assert_eq!(f.pe_ratio, Some(8.5));
        assert_eq!(f.pb_ratio, Some(0.95));
        assert!((f.dividend_yield_pct.unwrap() - 3.2).abs() < 1e-9);
        assert_eq!(f.volume, Some(1_500_000));
        assert_eq!(f.avg_volume, None);
        assert_eq!(f.sector.as_deref(), Some("Consumer Cyclical"));
    }

    #[test]
    fn empty_summary_is_all_unknown() {
        let body: SummaryResponse = serde_json::from_str(r#"{"quoteSummary":{"result":[]}}"#).unwrap();
        assert_eq!(fundamentals_from_summary(body), Fundamentals::default());
    }

    #[test]
    fn config_reads_overrides_and_rejects_garbage() {
        let env: HashMap<&str, &str> = [("YTD_PAGE_DELAY_MS", "0"), ("YTD_HTTP_TIMEOUT_SECS", "5")].into();
        let cfg = YahooConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.page_delay, Duration::ZERO);
        assert_eq!(cfg.detail_delay, Duration::from_millis(500));
        assert_eq!(cfg.timeout, Duration::from_secs(5));

        let bad: HashMap<&str, &str> = [("YTD_DETAIL_DELAY_MS", "fast")].into();
        let err = YahooConfig::from_lookup(|k| bad.get(k).map(|v| v.to_string())).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn client_throttles_follow_config() {
        let config = YahooConfig {
            page_delay: Duration::from_millis(1500),
            detail_delay: Duration::ZERO,
            ..YahooConfig::default()
        };
        let client = YahooClient::new(config).unwrap();
        assert_eq!(client.page_throttle.delay(), Duration::from_millis(1500));
        assert_eq!(client.detail_throttle.delay(), Duration::ZERO);
    }
}
