//! Recovery-potential score for YTD-low stocks.
//!
//! The score is an additive point system over a single immutable
//! [`StockMetrics`] record:
//!
//! - every stock starts from a base of 50
//! - each category awards at most one band (first match wins, highest threshold first)
//! - categories are independent of each other
//! - the total is capped at 100 (not rescaled)
//!
//! A rule keyed on an optional field is skipped when the field is `None`;
//! missing data never costs points.

use crate::domain::{Factor, FactorCategory, Grade, ScoreResult, StockMetrics};
use crate::error::ScoreError;

/// Upper bound of the score.
pub const MAX_SCORE: u32 = 100;

/// One row of the rule table.
struct Rule {
    category: FactorCategory,
    label: &'static str,
    points: u32,
    applies: fn(&StockMetrics) -> bool,
}

/// Rule table, grouped by category, bands ordered highest threshold first.
const RULES: &[Rule] = &[
    Rule {
        category: FactorCategory::Base,
        label: "base",
        points: 50,
        applies: |_| true,
    },
    Rule {
        category: FactorCategory::Recovery,
        label: "recovered >= 20% from low",
        points: 15,
        applies: |m| m.recovery_from_low_pct >= 20.0,
    },
    Rule {
        category: FactorCategory::Recovery,
        label: "recovered 10-20% from low",
        points: 10,
        applies: |m| m.recovery_from_low_pct >= 10.0,
    },
    Rule {
        category: FactorCategory::Recovery,
        label: "recovered 5-10% from low",
        points: 5,
        applies: |m| m.recovery_from_low_pct >= 5.0,
    },
    Rule {
        category: FactorCategory::PriceToBook,
        label: "PBR < 1.0",
        points: 15,
        applies: |m| positive(m.pb_ratio).is_some_and(|pb| pb < 1.0),
    },
    Rule {
        category: FactorCategory::PriceToBook,
        label: "PBR 1.0-1.5",
        points: 10,
        applies: |m| positive(m.pb_ratio).is_some_and(|pb| pb < 1.5),
    },
    Rule {
        category: FactorCategory::PriceToEarnings,
        label: "PER 5-15",
        points: 10,
        applies: |m| positive(m.pe_ratio).is_some_and(|pe| (5.0..=15.0).contains(&pe)),
    },
    Rule {
        category: FactorCategory::Dividend,
        label: "dividend yield >= 3%",
        points: 10,
        applies: |m| m.dividend_yield_pct >= 3.0,
    },
    Rule {
        category: FactorCategory::Trend,
        label: "uptrend (SMA20 > SMA50)",
        points: 15,
        applies: |m| matches!(moving_averages(m), Some((s20, s50)) if s20 > s50),
    },
    Rule {
        category: FactorCategory::Trend,
        label: "short-term uptrend (price > SMA20)",
        points: 5,
        applies: |m| matches!(moving_averages(m), Some((s20, _)) if m.current_price > s20),
    },
    Rule {
        category: FactorCategory::Volatility,
        label: "volatility < 30%",
        points: 5,
        applies: |m| m.volatility_pct.is_some_and(|v| v < 30.0),
    },
    Rule {
        category: FactorCategory::Drawdown,
        label: "drawdown >= 50%",
        points: 10,
        applies: |m| m.max_drawdown_pct.is_some_and(|v| v >= 50.0),
    },
    Rule {
        category: FactorCategory::Drawdown,
        label: "drawdown 30-50%",
        points: 5,
        applies: |m| m.max_drawdown_pct.is_some_and(|v| v >= 30.0),
    },
];

/// Compute the recovery score for one stock.
pub fn score(metrics: &StockMetrics) -> Result<ScoreResult, ScoreError> {
    validate(metrics)?;

    let mut factors: Vec<Factor> = Vec::new();
    for rule in RULES {
        if factors.iter().any(|f| f.category == rule.category) {
            continue;
        }
        if (rule.applies)(metrics) {
            factors.push(Factor {
                category: rule.category,
                label: rule.label.to_string(),
                points: rule.points,
            });
        }
    }

    let raw_total: u32 = factors.iter().map(|f| f.points).sum();
    let score = raw_total.min(MAX_SCORE) as u8;

    Ok(ScoreResult {
        score,
        raw_total,
        factors,
        grade: Grade::from_score(score),
    })
}

fn validate(m: &StockMetrics) -> Result<(), ScoreError> {
    let invalid = |reason: String| ScoreError::InvalidInput {
        code: m.code.clone(),
        reason,
    };

    if !(m.current_price.is_finite() && m.current_price > 0.0) {
        return Err(invalid(format!("current price must be positive (got {})", m.current_price)));
    }
    if !(m.ytd_low.is_finite() && m.ytd_low > 0.0) {
        return Err(invalid(format!("YTD low must be positive (got {})", m.ytd_low)));
    }
    if let Some(v) = m.volatility_pct.filter(|v| !(v.is_finite() && *v >= 0.0)) {
        return Err(invalid(format!("volatility must be >= 0 (got {v})")));
    }
    if let Some(v) = m.max_drawdown_pct.filter(|v| !(v.is_finite() && *v >= 0.0)) {
        return Err(invalid(format!("max drawdown must be >= 0 (got {v})")));
    }
    if !m.recovery_from_low_pct.is_finite() {
        return Err(invalid("recovery from low is not a number".to_string()));
    }
    Ok(())
}

/// Valuation multiples only count when positive.
fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn moving_averages(m: &StockMetrics) -> Option<(f64, f64)> {
    Some((positive(m.sma_20)?, positive(m.sma_50)?))
}
