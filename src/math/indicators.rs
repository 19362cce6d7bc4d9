//! Price-series indicators: moving averages, volatility and drawdown.
//!
//! All functions take closes in chronological order and are pure.

/// Trading days per year used to annualize daily volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Simple moving average over the trailing `window` values.
pub fn sma(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let tail = &values[values.len() - window..];
    let mean = tail.iter().sum::<f64>() / window as f64;
    mean.is_finite().then_some(mean)
}

/// Rolling SMA series aligned to `values` (`None` until the window fills).
pub fn sma_series(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if window == 0 {
        out.resize(values.len(), None);
        return out;
    }

    let mut sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        if i + 1 >= window {
            out.push(Some(sum / window as f64));
        } else {
            out.push(None);
        }
    }
    out
}

/// Annualized volatility in percent: sample std dev of simple daily returns × √252 × 100.
pub fn annualized_volatility_pct(closes: &[f64]) -> Option<f64> {
    if closes.len() < 3 {
        return None;
    }

    let mut returns = Vec::with_capacity(closes.len() - 1);
    for w in closes.windows(2) {
        let (prev, curr) = (w[0], w[1]);
        if prev > 0.0 && curr.is_finite() {
            returns.push(curr / prev - 1.0);
        }
    }

    if returns.len() < 2 {
        return None;
    }

    // Sample variance with n-1 denominator.
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);

    let vol = variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt() * 100.0;
    vol.is_finite().then_some(vol)
}

/// Largest peak-to-trough decline in percent (`>= 0`).
pub fn max_drawdown_pct(closes: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &c in closes {
        if !c.is_finite() {
            continue;
        }
        peak = peak.max(c);
        if peak > 0.0 {
            worst = worst.max((peak - c) / peak * 100.0);
        }
    }
    worst
}

/// Percent change from `from` to `to`.
pub fn pct_change(from: f64, to: f64) -> Option<f64> {
    if !(from.is_finite() && to.is_finite()) || from <= 0.0 {
        return None;
    }
    Some((to - from) / from * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_uses_trailing_window() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&v, 2), Some(4.5));
        assert_eq!(sma(&v, 5), Some(3.0));
        assert_eq!(sma(&v, 6), None);
        assert_eq!(sma(&v, 0), None);
    }

    #[test]
    fn sma_series_matches_point_sma() {
        let v = [10.0, 12.0, 11.0, 15.0, 14.0, 13.0];
        let series = sma_series(&v, 3);
        assert_eq!(series[0], None);
        assert_eq!(series[1], None);
        for i in 2..v.len() {
            let expected = sma(&v[..=i], 3).unwrap();
            assert!((series[i].unwrap() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn constant_series_has_zero_volatility() {
        let v = [100.0; 10];
        let vol = annualized_volatility_pct(&v).unwrap();
        assert!(vol.abs() < 1e-10, "Constant series should have zero vol");
    }

    #[test]
    fn alternating_series_volatility() {
        // Returns: +10%, -10%, +10%, -10% -> sample std = 0.11547
        let v = [100.0, 110.0, 99.0, 108.9, 98.01];
        let vol = annualized_volatility_pct(&v).unwrap();
        let expected = 0.115_470_053_8 * 252.0_f64.sqrt() * 100.0;
        assert!((vol - expected).abs() < 1e-3, "Expected {expected}, got {vol}");
    }

    #[test]
    fn volatility_needs_three_closes() {
        assert_eq!(annualized_volatility_pct(&[100.0, 101.0]), None);
    }

    #[test]
    fn drawdown_of_rising_series_is_zero() {
        assert_eq!(max_drawdown_pct(&[1.0, 2.0, 3.0, 4.0]), 0.0);
    }

    #[test]
    fn drawdown_tracks_running_peak() {
        // Peak 200 -> trough 80 is 60%; the later 150 -> 120 is only 20%.
        let v = [100.0, 200.0, 80.0, 150.0, 120.0];
        assert!((max_drawdown_pct(&v) - 60.0).abs() < 1e-12);
    }

    #[test]
    fn pct_change_rejects_non_positive_base() {
        assert_eq!(pct_change(0.0, 10.0), None);
        assert_eq!(pct_change(100.0, 125.0), Some(25.0));
    }
}
