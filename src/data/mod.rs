//! Market data sources.
//!
//! The pipeline only sees `&dyn MarketData`; `yahoo` talks to the network,
//! `sample` generates a seeded synthetic market for offline runs and tests.

use std::cell::Cell;
use std::time::{Duration, Instant};

use crate::domain::{Fundamentals, ListingQuery, PriceBar, StockListing};
use crate::error::AppError;

pub mod listing;
pub mod sample;
pub mod yahoo;

pub use sample::SampleMarket;
pub use yahoo::YahooClient;

/// A source of ranking listings, price histories and fundamentals.
pub trait MarketData {
    /// Short human-readable name shown in reports.
    fn name(&self) -> &str;

    fn fetch_listing(&self, query: &ListingQuery) -> Result<Vec<StockListing>, AppError>;
    fn fetch_history(&self, code: &str) -> Result<Vec<PriceBar>, AppError>;
    fn fetch_fundamentals(&self, code: &str) -> Result<Fundamentals, AppError>;

    /// Request accounting, when the source makes real requests.
    fn request_summary(&self) -> Option<RequestSummary> {
        None
    }
}

/// Minimum delay between consecutive calls. The first call never waits.
#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    last: Cell<Option<Instant>>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Cell::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Block until `delay` has passed since the previous call.
    pub fn wait(&self) {
        if let Some(last) = self.last.get() {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
        self.last.set(Some(Instant::now()));
    }
}

/// Per-client request counters.
#[derive(Debug, Default)]
pub struct RequestStats {
    requests: Cell<u32>,
    successes: Cell<u32>,
    failures: Cell<u32>,
    total: Cell<Duration>,
}

/// Point-in-time copy of `RequestStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestSummary {
    pub requests: u32,
    pub successes: u32,
    pub failures: u32,
    pub total_secs: f64,
}

impl RequestSummary {
    pub fn success_rate_pct(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.successes as f64 / self.requests as f64 * 100.0
    }

    pub fn mean_secs(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.total_secs / self.requests as f64
    }
}

impl RequestStats {
    pub fn record(&self, elapsed: Duration, ok: bool) {
        self.requests.set(self.requests.get() + 1);
        if ok {
            self.successes.set(self.successes.get() + 1);
        } else {
            self.failures.set(self.failures.get() + 1);
        }
        self.total.set(self.total.get() + elapsed);
    }

    pub fn summary(&self) -> RequestSummary {
        RequestSummary {
            requests: self.requests.get(),
            successes: self.successes.get(),
            failures: self.failures.get(),
            total_secs: self.total.get().as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_throttle_call_does_not_wait() {
        let throttle = Throttle::new(Duration::from_millis(200));
        let start = Instant::now();
        throttle.wait();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn throttle_spaces_consecutive_calls() {
        let throttle = Throttle::new(Duration::from_millis(50));
        let start = Instant::now();
        throttle.wait();
        throttle.wait();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn request_stats_accumulate() {
        let stats = RequestStats::default();
        stats.record(Duration::from_millis(100), true);
        stats.record(Duration::from_millis(300), false);
        let s = stats.summary();
        assert_eq!(s.requests, 2);
        assert_eq!(s.successes, 1);
        assert_eq!(s.failures, 1);
        assert!((s.success_rate_pct() - 50.0).abs() < 1e-9);
        assert!((s.mean_secs() - 0.2).abs() < 1e-9);
    }
}
