//! Synthetic market data for unit tests

use crate::types::{Bar, CounterpartyClass, FlowRecord};
use chrono::{Duration, NaiveDate};

pub fn day(offset: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + Duration::days(offset as i64)
}

/// Bars with the given closes, a 1% intraday range and flat volume
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let open = if i == 0 { c } else { closes[i - 1] };
            Bar {
                date: day(i),
                open,
                high: c.max(open) * 1.005,
                low: c.min(open) * 0.995,
                close: c,
                volume: 1_000_000.0,
            }
        })
        .collect()
}

/// Compounding closes at `pct` per bar
pub fn trending_closes(n: usize, start: f64, pct: f64) -> Vec<f64> {
    (0..n).map(|i| start * (1.0 + pct / 100.0).powi(i as i32)).collect()
}

/// Zig-zag closes around a flat level
pub fn choppy_closes(n: usize, level: f64, amplitude_pct: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            level * (1.0 + sign * amplitude_pct / 100.0)
        })
        .collect()
}

/// One institutional flow record per bar with the given daily net
pub fn flows_for(bars: &[Bar], net: impl Fn(usize) -> f64) -> Vec<FlowRecord> {
    bars.iter()
        .enumerate()
        .map(|(i, b)| {
            let n = net(i);
            FlowRecord {
                date: b.date,
                counterparty: CounterpartyClass::Foreign,
                buy_volume: 50_000.0 + n.max(0.0),
                sell_volume: 50_000.0 + (-n).max(0.0),
            }
        })
        .collect()
}
