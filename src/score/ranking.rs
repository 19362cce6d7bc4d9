//! Ranking and filtering of scored stocks.
//!
//! Orderings are total and deterministic: ties are broken by stock code.

use std::cmp::Ordering;

use crate::domain::{HighFilter, HighStock, RecoveryFilter, ScoredStock};

/// Sort by recovery score (descending), ties by code (ascending).
pub fn rank_by_score(items: &mut [ScoredStock]) {
    items.sort_by(|a, b| {
        b.score
            .score
            .cmp(&a.score.score)
            .then_with(|| a.metrics.code.cmp(&b.metrics.code))
    });
}

/// Sort by YTD return (descending), ties by code (ascending).
pub fn rank_by_return(items: &mut [HighStock]) {
    items.sort_by(|a, b| {
        cmp_f64(b.metrics.ytd_return_pct, a.metrics.ytd_return_pct)
            .then_with(|| a.metrics.code.cmp(&b.metrics.code))
    });
}

/// The `n` stocks that fell furthest from their year-start price to the YTD low.
///
/// Stocks without YTD detail are left out.
pub fn worst_performers(items: &[ScoredStock], n: usize) -> Vec<&ScoredStock> {
    let mut with_detail: Vec<&ScoredStock> = items.iter().filter(|s| s.detail.is_some()).collect();
    with_detail.sort_by(|a, b| {
        let da = a.detail.as_ref().map(|d| d.low_decline_pct).unwrap_or(0.0);
        let db = b.detail.as_ref().map(|d| d.low_decline_pct).unwrap_or(0.0);
        cmp_f64(da, db).then_with(|| a.metrics.code.cmp(&b.metrics.code))
    });
    with_detail.truncate(n);
    with_detail
}

/// Total order on floats for ranking (NaN sorts last).
fn cmp_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl RecoveryFilter {
    pub fn is_empty(&self) -> bool {
        self.min_score.is_none()
            && self.min_recovery_from_low.is_none()
            && self.max_pb_ratio.is_none()
            && self.min_dividend_yield.is_none()
            && self.sectors.is_empty()
    }

    /// All enabled criteria must hold. A criterion on a missing value fails.
    pub fn matches(&self, stock: &ScoredStock) -> bool {
        if let Some(min) = self.min_score {
            if stock.score.score < min {
                return false;
            }
        }
        if let Some(min) = self.min_recovery_from_low {
            if stock.metrics.recovery_from_low_pct < min {
                return false;
            }
        }
        if let Some(max) = self.max_pb_ratio {
            match stock.metrics.pb_ratio {
                Some(pb) if pb <= max => {}
                _ => return false,
            }
        }
        if let Some(min) = self.min_dividend_yield {
            match stock.fundamentals.dividend_yield_pct {
                Some(dy) if dy >= min => {}
                _ => return false,
            }
        }
        sector_matches(&self.sectors, stock.fundamentals.sector.as_deref())
    }

    /// Keep the matching stocks, preserving order.
    pub fn apply<'a>(&self, items: &'a [ScoredStock]) -> Vec<&'a ScoredStock> {
        items.iter().filter(|s| self.matches(s)).collect()
    }
}

impl HighFilter {
    pub fn is_empty(&self) -> bool {
        self.min_ytd_return.is_none()
            && self.min_high_return.is_none()
            && self.min_market_cap.is_none()
            && self.sectors.is_empty()
    }

    pub fn matches(&self, stock: &HighStock) -> bool {
        if let Some(min) = self.min_ytd_return {
            if stock.metrics.ytd_return_pct < min {
                return false;
            }
        }
        if let Some(min) = self.min_high_return {
            if stock.metrics.high_return_pct < min {
                return false;
            }
        }
        if let Some(min) = self.min_market_cap {
            match stock.fundamentals.market_cap {
                Some(cap) if cap >= min => {}
                _ => return false,
            }
        }
        sector_matches(&self.sectors, stock.fundamentals.sector.as_deref())
    }

    pub fn apply<'a>(&self, items: &'a [HighStock]) -> Vec<&'a HighStock> {
        items.iter().filter(|s| self.matches(s)).collect()
    }
}

fn sector_matches(sectors: &[String], sector: Option<&str>) -> bool {
    if sectors.is_empty() {
        return true;
    }
    sector.is_some_and(|s| sectors.iter().any(|want| want == s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Fundamentals, Grade, LowDetail, ScoreResult, StockListing, StockMetrics};
    use chrono::NaiveDate;

    fn scored(code: &str, score: u8) -> ScoredStock {
        ScoredStock {
            listing: StockListing {
                rank: 1,
                code: code.to_string(),
                name: format!("{code} Corp"),
                market: Some("Prime".to_string()),
                url: String::new(),
                columns: Vec::new(),
            },
            fundamentals: Fundamentals::default(),
            metrics: StockMetrics {
                code: code.to_string(),
                current_price: 100.0,
                ytd_low: 90.0,
                recovery_from_low_pct: 11.1,
                pe_ratio: None,
                pb_ratio: None,
                dividend_yield_pct: 0.0,
                sma_20: None,
                sma_50: None,
                volatility_pct: Some(20.0),
                max_drawdown_pct: Some(10.0),
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
    fn ranks_by_score_then_code() {
        let mut items = vec![scored("B", 70), scored("A", 90), scored("C", 70)];
        rank_by_score(&mut items);
        let order: Vec<(&str, u8)> = items
            .iter()
            .map(|s| (s.metrics.code.as_str(), s.score.score))
            .collect();
        assert_eq!(order, vec![("A", 90), ("B", 70), ("C", 70)]);
    }

    #[test]
    fn filter_is_conjunctive() {
        let mut cheap = scored("1111", 80);
        cheap.metrics.pb_ratio = Some(0.9);
        let mut pricey = scored("2222", 85);
        pricey.metrics.pb_ratio = Some(2.0);
        let no_pb = scored("3333", 90);
        let low = scored("4444", 55);

        let filter = RecoveryFilter {
            min_score: Some(60),
            max_pb_ratio: Some(1.5),
            ..RecoveryFilter::default()
        };
        let items = vec![cheap, pricey, no_pb, low];
        let kept: Vec<&str> = filter.apply(&items).iter().map(|s| s.metrics.code.as_str()).collect();
        assert_eq!(kept, vec!["1111"]);
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let filter = RecoveryFilter::default();
        assert!(filter.is_empty());
        let items = vec![scored("A", 50), scored("B", 100)];
        assert_eq!(filter.apply(&items).len(), 2);
    }

    #[test]
    fn sector_filter_is_exact_and_excludes_unknown_sector() {
        let mut bank = scored("8306", 70);
        bank.fundamentals.sector = Some("Financial Services".to_string());
        let unknown = scored("9999", 70);

        let filter = RecoveryFilter {
            sectors: vec!["Financial Services".to_string()],
            ..RecoveryFilter::default()
        };
        assert!(filter.matches(&bank));
        assert!(!filter.matches(&unknown));

        let lowercase = RecoveryFilter {
            sectors: vec!["financial services".to_string()],
            ..RecoveryFilter::default()
        };
        assert!(!lowercase.matches(&bank));
    }

    #[test]
    fn worst_performers_orders_by_decline() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let detail = |decline: f64| LowDetail {
            ytd_low_date: date,
            ytd_high: 120.0,
            ytd_high_date: date,
            year_start_price: 110.0,
            ytd_return_pct: -5.0,
            low_decline_pct: decline,
        };
        let mut a = scored("A", 60);
        a.detail = Some(detail(-12.0));
        let mut b = scored("B", 60);
        b.detail = Some(detail(-40.0));
        let c = scored("C", 60);

        let items = vec![a, b, c];
        let worst: Vec<&str> = worst_performers(&items, 5)
            .iter()
            .map(|s| s.metrics.code.as_str())
            .collect();
        assert_eq!(worst, vec!["B", "A"]);
    }
}
