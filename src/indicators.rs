//! Technical indicators over daily bars
//!
//! Every function returns `None` instead of a non-finite number: a missing
//! window or a zero denominator makes the indicator unavailable.

use crate::types::Bar;

/// Ratio guarded against zero and non-finite results
pub fn safe_ratio(num: f64, den: f64) -> Option<f64> {
    if !num.is_finite() || !den.is_finite() || den.abs() < f64::EPSILON {
        return None;
    }
    let r = num / den;
    r.is_finite().then_some(r)
}

/// Percent change from `from` to `to`
pub fn pct_change(from: f64, to: f64) -> Option<f64> {
    safe_ratio(to - from, from).map(|r| r * 100.0)
}

pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Simple moving average of the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let sum: f64 = values.iter().rev().take(period).sum();
    safe_ratio(sum, period as f64)
}

/// Exponential moving average series, seeded with the SMA of the first `period` values.
/// The returned series is aligned with `values[period - 1..]`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed: f64 = values.iter().take(period).sum::<f64>() / period as f64;
    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut ema = seed;
    for v in values.iter().skip(period) {
        ema = (v - ema) * multiplier + ema;
        out.push(ema);
    }
    out
}

/// Relative strength index over the last `period` changes (simple averages)
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }
    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in (values.len() - period)..values.len() {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses += change.abs();
        }
    }
    if losses == 0.0 && gains == 0.0 {
        return Some(50.0);
    }
    if losses == 0.0 {
        return Some(100.0);
    }
    let rs = gains / losses;
    let rsi = 100.0 - (100.0 / (1.0 + rs));
    rsi.is_finite().then_some(rsi)
}

/// MACD histogram series (12/26/9), aligned with the tail of `values`
pub fn macd_histogram(values: &[f64]) -> Vec<f64> {
    let fast = ema_series(values, 12);
    let slow = ema_series(values, 26);
    if slow.is_empty() {
        return Vec::new();
    }
    // fast starts at index 11, slow at 25
    let offset = 26 - 12;
    let macd: Vec<f64> = slow
        .iter()
        .enumerate()
        .map(|(i, s)| fast[i + offset] - s)
        .collect();
    let signal = ema_series(&macd, 9);
    if signal.is_empty() {
        return Vec::new();
    }
    let skip = macd.len() - signal.len();
    macd.iter()
        .skip(skip)
        .zip(signal.iter())
        .map(|(m, s)| m - s)
        .collect()
}

/// Average true range over the last `period` bars
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }
    let mut tr_sum = 0.0;
    for i in (bars.len() - period)..bars.len() {
        let current = &bars[i];
        let previous = &bars[i - 1];
        let tr1 = current.high - current.low;
        let tr2 = (current.high - previous.close).abs();
        let tr3 = (current.low - previous.close).abs();
        tr_sum += tr1.max(tr2).max(tr3);
    }
    safe_ratio(tr_sum, period as f64)
}

/// Percent return over the last `period` bars
pub fn period_return(values: &[f64], period: usize) -> Option<f64> {
    if values.len() < period + 1 {
        return None;
    }
    let current = values[values.len() - 1];
    let past = values[values.len() - 1 - period];
    pct_change(past, current)
}

/// Daily simple returns of the last `period` changes
pub fn daily_returns(values: &[f64], period: usize) -> Option<Vec<f64>> {
    if values.len() < period + 1 {
        return None;
    }
    let start = values.len() - period;
    (start..values.len())
        .map(|i| safe_ratio(values[i] - values[i - 1], values[i - 1]))
        .collect()
}

/// Sample standard deviation
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    let sd = var.sqrt();
    sd.is_finite().then_some(sd)
}

/// Latest volume relative to the mean of up to `period` prior volumes
pub fn volume_ratio(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.len() < 2 {
        return None;
    }
    let current = bars[bars.len() - 1].volume;
    let count = period.min(bars.len() - 1);
    let sum: f64 = bars.iter().rev().skip(1).take(count).map(|b| b.volume).sum();
    let avg = safe_ratio(sum, count as f64)?;
    safe_ratio(current, avg)
}

/// Lowest low and highest high of the `period` bars before the latest one
pub fn prior_range(bars: &[Bar], period: usize) -> Option<(f64, f64)> {
    if bars.len() < period + 1 {
        return None;
    }
    let window = &bars[bars.len() - 1 - period..bars.len() - 1];
    let low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    (low.is_finite() && high.is_finite()).then_some((low, high))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_ratio_guards_zero() {
        assert_eq!(safe_ratio(1.0, 0.0), None);
        assert_eq!(safe_ratio(f64::NAN, 2.0), None);
        assert_eq!(safe_ratio(3.0, 2.0), Some(1.5));
    }

    #[test]
    fn test_sma_and_period_return() {
        let v = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(sma(&v, 2), Some(3.5));
        assert_eq!(sma(&v, 5), None);
        assert_eq!(period_return(&v, 3), Some(300.0));
    }

    #[test]
    fn test_rsi_extremes() {
        let up: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert_eq!(rsi(&up, 14), Some(100.0));
        let flat = vec![5.0; 20];
        assert_eq!(rsi(&flat, 14), Some(50.0));
        let down: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        assert!(rsi(&down, 14).unwrap() < 1.0);
    }

    #[test]
    fn test_ema_series_alignment() {
        let v: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let e = ema_series(&v, 3);
        assert_eq!(e.len(), 8);
        assert!((e[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_macd_histogram_needs_history() {
        let short: Vec<f64> = (0..30).map(|i| i as f64).collect();
        assert!(macd_histogram(&short).is_empty());
        let long: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        assert_eq!(macd_histogram(&long).len(), 60 - 33);
    }
}
