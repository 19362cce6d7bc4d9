//! Seeded synthetic market for offline runs, demos and tests.
//!
//! Every stock's history and fundamentals are derived from `(seed, code)`
//! alone, so a stock looks the same whichever listing it was reached from.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::MarketData;
use crate::domain::{Fundamentals, ListingKind, ListingQuery, Market, PriceBar, StockListing};
use crate::error::AppError;

/// Bars per synthetic history (about one trading year).
pub const HISTORY_BARS: usize = 250;
/// Stocks per ranking kind.
pub const LISTING_SIZE: u32 = 60;
pub const PAGE_SIZE: u32 = 25;

const SECTORS: [&str; 8] = [
    "Industrials",
    "Technology",
    "Financial Services",
    "Consumer Cyclical",
    "Basic Materials",
    "Real Estate",
    "Healthcare",
    "Utilities",
];
const NAME_STEMS: [&str; 8] = [
    "Asahi", "Kanto", "Nippon", "Sakura", "Tokai", "Hokuto", "Seiryu", "Mizuho",
];
const NAME_TAILS: [&str; 6] = ["Holdings", "Industries", "Electric", "Trading", "Chemical", "Systems"];
const SEGMENTS: [&str; 3] = ["東証PRM", "東証STD", "東証GRT"];

/// Drift/volatility regime of a synthetic stock, chosen by its code block.
#[derive(Debug, Clone, Copy)]
struct Profile {
    /// Annualized drift range.
    drift: (f64, f64),
    /// Annualized volatility range.
    vol: (f64, f64),
}

#[derive(Debug, Clone)]
pub struct SampleMarket {
    seed: u64,
    end_date: NaiveDate,
}

impl SampleMarket {
    pub fn new(seed: u64) -> Self {
        Self::with_end_date(seed, Local::now().date_naive())
    }

    /// Fix the last bar's date (tests use this to stay calendar-independent).
    pub fn with_end_date(seed: u64, end_date: NaiveDate) -> Self {
        Self { seed, end_date }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn rng_for(&self, code: &str, stream: &str) -> StdRng {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        code.hash(&mut hasher);
        stream.hash(&mut hasher);
        StdRng::seed_from_u64(hasher.finish())
    }

    fn generate_history(&self, code: &str) -> Result<Vec<PriceBar>, AppError> {
        let profile = profile_for(code)?;
        let mut rng = self.rng_for(code, "history");
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

        let drift = rng.gen_range(profile.drift.0..=profile.drift.1);
        let sigma = rng.gen_range(profile.vol.0..=profile.vol.1);
        let dt = 1.0 / 252.0;
        let base_volume: f64 = rng.gen_range(50_000.0..2_000_000.0);

        let dates = trading_days(self.end_date, HISTORY_BARS);
        let mut price: f64 = rng.gen_range(300.0..6000.0);
        let mut bars = Vec::with_capacity(dates.len());

        for date in dates {
            let open = price;
            let z: f64 = normal.sample(&mut rng);
            price *= ((drift - 0.5 * sigma * sigma) * dt + sigma * dt.sqrt() * z).exp();
            let close = round_tick(price);
            let wick_up: f64 = normal.sample(&mut rng);
            let wick_down: f64 = normal.sample(&mut rng);
            let high = open.max(close) * (1.0 + wick_up.abs() * 0.004);
            let low = open.min(close) * (1.0 - (wick_down.abs() * 0.004).min(0.05));
            let volume_noise: f64 = rng.r#gen();
            bars.push(PriceBar {
                date,
                open: round_tick(open),
                high: round_tick(high),
                low: round_tick(low),
                close,
                volume: (base_volume * (0.5 + volume_noise)) as u64,
            });
        }
        Ok(bars)
    }

    fn listing_row(&self, query: &ListingQuery, rank: u32) -> Result<StockListing, AppError> {
        let code = (code_block(query.kind) + rank).to_string();
        let mut rng = self.rng_for(&code, "profile");
        let name = format!(
            "{} {}",
            NAME_STEMS[rng.gen_range(0..NAME_STEMS.len())],
            NAME_TAILS[rng.gen_range(0..NAME_TAILS.len())]
        );
        let market = match query.market {
            Market::All => SEGMENTS[rng.gen_range(0..SEGMENTS.len())].to_string(),
            Market::Tokyo => "東証PRM".to_string(),
            Market::Osaka => "大証".to_string(),
            Market::Nagoya => "名証".to_string(),
            Market::Sapporo => "札証".to_string(),
            Market::Fukuoka => "福証".to_string(),
        };

        let history = self.generate_history(&code)?;
        let columns = listing_columns(query.kind, &history);

        Ok(StockListing {
            rank,
            url: format!("https://finance.yahoo.co.jp/quote/{code}.T"),
            code,
            name,
            market: Some(market),
            columns,
        })
    }
}

impl MarketData for SampleMarket {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_listing(&self, query: &ListingQuery) -> Result<Vec<StockListing>, AppError> {
        if query.page == 0 {
            return Err(AppError::new(2, "Page number must be >= 1."));
        }
        let first = (query.page - 1).saturating_mul(PAGE_SIZE) + 1;
        let last = (query.page.saturating_mul(PAGE_SIZE)).min(LISTING_SIZE);
        (first..=last).map(|rank| self.listing_row(query, rank)).collect()
    }

    fn fetch_history(&self, code: &str) -> Result<Vec<PriceBar>, AppError> {
        self.generate_history(code)
    }

    fn fetch_fundamentals(&self, code: &str) -> Result<Fundamentals, AppError> {
        profile_for(code)?;
        let mut rng = self.rng_for(code, "fundamentals");
        let last_close = self
            .generate_history(code)?
            .last()
            .map(|b| b.close)
            .unwrap_or(0.0);

        // Roughly one in ten stocks has no earnings or book value on file.
        let pe_ratio = (rng.r#gen::<f64>() > 0.1).then(|| round2(rng.gen_range(4.0..40.0)));
        let pb_ratio = (rng.r#gen::<f64>() > 0.1).then(|| round2(rng.gen_range(0.4..3.0)));
        let dividend_yield_pct = (rng.r#gen::<f64>() > 0.15).then(|| round2(rng.gen_range(0.0..5.0)));
        let shares: f64 = rng.gen_range(1.0e7..2.0e9);
        let volume = rng.gen_range(10_000..3_000_000);
        let avg_volume = rng.gen_range(10_000..3_000_000);

        Ok(Fundamentals {
            long_name: None,
            sector: Some(SECTORS[rng.gen_range(0..SECTORS.len())].to_string()),
            industry: None,
            pe_ratio,
            pb_ratio,
            dividend_yield_pct,
            market_cap: Some((last_close * shares).round()),
            volume: Some(volume),
            avg_volume: Some(avg_volume),
        })
    }
}

fn code_block(kind: ListingKind) -> u32 {
    match kind {
        ListingKind::YtdLow => 1000,
        ListingKind::YtdHigh => 2000,
        ListingKind::StopHigh => 3000,
        ListingKind::StopLow => 4000,
    }
}

fn profile_for(code: &str) -> Result<Profile, AppError> {
    let n: u32 = code
        .parse()
        .map_err(|_| AppError::new(4, format!("Unknown synthetic stock code '{code}'.")))?;
    let profile = match n / 1000 {
        1 => Profile {
            drift: (-0.6, -0.1),
            vol: (0.2, 0.55),
        },
        2 => Profile {
            drift: (0.15, 0.6),
            vol: (0.15, 0.4),
        },
        3 => Profile {
            drift: (0.0, 0.5),
            vol: (0.3, 0.7),
        },
        4 => Profile {
            drift: (-0.5, 0.0),
            vol: (0.3, 0.7),
        },
        _ => return Err(AppError::new(4, format!("Unknown synthetic stock code '{code}'."))),
    };
    Ok(profile)
}

/// Cells shown after the name column, in ranking-page order.
fn listing_columns(kind: ListingKind, history: &[PriceBar]) -> Vec<String> {
    let Some(last) = history.last() else {
        return Vec::new();
    };
    let prev = history.len().checked_sub(2).map(|i| history[i].close).unwrap_or(last.close);
    if kind.is_stop() {
        let change = last.close - prev;
        let rate = if prev > 0.0 { change / prev * 100.0 } else { 0.0 };
        vec![
            format!("{:.0}", last.close),
            format!("{change:+.0}"),
            format!("{rate:+.2}"),
            last.volume.to_string(),
        ]
    } else {
        vec![format!("{:.0}", last.close), format!("{:.0}", prev)]
    }
}

/// The last `n` weekdays up to and including `end`, oldest first.
fn trading_days(end: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut d = end;
    while out.len() < n {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(d);
        }
        d -= Duration::days(1);
    }
    out.reverse();
    out
}

fn round_tick(p: f64) -> f64 {
    (p * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Term;

    fn market() -> SampleMarket {
        SampleMarket::with_end_date(7, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap())
    }

    fn query(kind: ListingKind, page: u32) -> ListingQuery {
        ListingQuery {
            kind,
            market: Market::All,
            term: Term::Daily,
            page,
        }
    }

    #[test]
    fn same_seed_same_market() {
        let a = market();
        let b = market();
        assert_eq!(a.fetch_history("1001").unwrap(), b.fetch_history("1001").unwrap());
        assert_eq!(a.fetch_fundamentals("1001").unwrap(), b.fetch_fundamentals("1001").unwrap());
        assert_eq!(
            a.fetch_listing(&query(ListingKind::YtdLow, 1)).unwrap(),
            b.fetch_listing(&query(ListingKind::YtdLow, 1)).unwrap()
        );
    }

    #[test]
    fn different_seed_different_history() {
        let end = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let a = SampleMarket::with_end_date(1, end).fetch_history("1001").unwrap();
        let b = SampleMarket::with_end_date(2, end).fetch_history("1001").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn history_is_weekday_bars_ending_on_end_date() {
        let bars = market().fetch_history("2005").unwrap();
        assert_eq!(bars.len(), HISTORY_BARS);
        assert_eq!(bars.last().unwrap().date, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
        assert!(bars.windows(2).all(|w| w[0].date < w[1].date));
        for b in &bars {
            assert!(!matches!(b.date.weekday(), Weekday::Sat | Weekday::Sun));
            assert!(b.low <= b.close && b.close <= b.high);
            assert!(b.low > 0.0);
        }
    }

    #[test]
    fn listing_pages_partition_the_universe() {
        let m = market();
        let p1 = m.fetch_listing(&query(ListingKind::StopHigh, 1)).unwrap();
        let p3 = m.fetch_listing(&query(ListingKind::StopHigh, 3)).unwrap();
        let p4 = m.fetch_listing(&query(ListingKind::StopHigh, 4)).unwrap();
        assert_eq!(p1.len(), PAGE_SIZE as usize);
        assert_eq!(p1[0].rank, 1);
        assert_eq!(p1[0].code, "3001");
        assert_eq!(p1[0].columns.len(), 4);
        assert_eq!(p3.len(), (LISTING_SIZE - 2 * PAGE_SIZE) as usize);
        assert!(p4.is_empty());
        assert!(m.fetch_listing(&query(ListingKind::StopHigh, 0)).is_err());
    }

    #[test]
    fn unknown_code_is_an_error() {
        assert!(market().fetch_history("ABCD").is_err());
        assert!(market().fetch_fundamentals("9001").is_err());
    }
}
