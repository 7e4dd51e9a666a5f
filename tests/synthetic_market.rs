//! Synthetic market data shared by the integration tests
#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use factor_lens::types::CounterpartyClass;
use factor_lens::{Bar, FlowRecord, Headline, MacroSeries, MacroSymbol, MarginRecord, ReferenceSeries, RevenueRecord, SecurityInputs};
use rand::{rngs::StdRng, Rng};

pub fn day(offset: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 3).unwrap() + Duration::days(offset as i64)
}

/// Bars with the given closes; open is the previous close, 1% intraday range
pub fn bars_from_closes(closes: &[f64], volume: impl Fn(usize) -> f64) -> Vec<Bar> {
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
                volume: volume(i),
            }
        })
        .collect()
}

pub fn trending_closes(n: usize, start: f64, pct: f64) -> Vec<f64> {
    (0..n).map(|i| start * (1.0 + pct / 100.0).powi(i as i32)).collect()
}

/// Multiplicative random walk with uniform daily moves of up to `max_move_pct`
pub fn random_walk(rng: &mut StdRng, n: usize, start: f64, drift_pct: f64, max_move_pct: f64) -> Vec<f64> {
    let mut price = start;
    (0..n)
        .map(|_| {
            let step = drift_pct + rng.gen_range(-max_move_pct..max_move_pct);
            price = (price * (1.0 + step / 100.0)).max(0.01);
            price
        })
        .collect()
}

/// Foreign plus retail flow per bar; only the foreign net is institutional
pub fn flows_for(bars: &[Bar], net: impl Fn(usize) -> f64) -> Vec<FlowRecord> {
    bars.iter()
        .enumerate()
        .flat_map(|(i, b)| {
            let n = net(i);
            [
                FlowRecord {
                    date: b.date,
                    counterparty: CounterpartyClass::Foreign,
                    buy_volume: 60_000.0 + n.max(0.0),
                    sell_volume: 60_000.0 + (-n).max(0.0),
                },
                FlowRecord {
                    date: b.date,
                    counterparty: CounterpartyClass::Retail,
                    buy_volume: 10_000.0,
                    sell_volume: 90_000.0,
                },
            ]
        })
        .collect()
}

pub fn margins_for(bars: &[Bar], start: f64, growth_pct: f64) -> Vec<MarginRecord> {
    bars.iter()
        .enumerate()
        .map(|(i, b)| MarginRecord {
            date: b.date,
            margin_balance: start * (1.0 + growth_pct / 100.0).powi(i as i32),
            short_balance: 1_000.0,
        })
        .collect()
}

/// Monthly revenue records ending at 2022-12
pub fn revenues(yoy: &[f64]) -> Vec<RevenueRecord> {
    let n = yoy.len();
    yoy.iter()
        .enumerate()
        .map(|(i, &g)| {
            let months_back = (n - 1 - i) as i32;
            let total = 2022 * 12 + 11 - months_back;
            RevenueRecord {
                year: total / 12,
                month: (total % 12 + 1) as u32,
                yoy_growth_pct: g,
            }
        })
        .collect()
}

pub fn headline(offset: usize, title: &str) -> Headline {
    Headline {
        date: day(offset),
        title: title.to_string(),
    }
}

/// Steady uptrend with institutional buying, growing revenue and good news
pub fn bullish_security(n: usize) -> SecurityInputs {
    let bars = bars_from_closes(&trending_closes(n, 50.0, 0.35), |_| 1_000_000.0);
    let flows = flows_for(&bars, |_| 6_000.0);
    let margins = margins_for(&bars, 1_000_000.0, 0.05);
    SecurityInputs {
        symbol: "BULL".to_string(),
        flows,
        margins,
        revenues: revenues(&[8.0, 10.0, 9.0, 12.0, 14.0, 15.0, 18.0, 21.0, 22.0, 25.0, 27.0, 30.0]),
        headlines: vec![headline(n - 2, "Company beats estimates and raises guidance")],
        as_of: None,
        bars,
    }
}

pub fn reference(rng: &mut StdRng, symbol: &str, n: usize) -> ReferenceSeries {
    let closes = random_walk(rng, n, 40.0, 0.02, 2.0);
    let bars = bars_from_closes(&closes, |i| 800_000.0 + (i % 7) as f64 * 50_000.0);
    let flows = flows_for(&bars, |i| if i % 3 == 0 { -4_000.0 } else { 3_000.0 });
    ReferenceSeries {
        symbol: symbol.to_string(),
        bars,
        flows,
    }
}

pub fn flat_macro(symbol: MacroSymbol, level: f64, n: usize) -> MacroSeries {
    MacroSeries::new(symbol, vec![level; n])
}

/// `n` points moving linearly from `start` by `total_pct` overall
pub fn ramp_macro(symbol: MacroSymbol, start: f64, total_pct: f64, n: usize) -> MacroSeries {
    let end = start * (1.0 + total_pct / 100.0);
    let closes = (0..n).map(|i| start + (end - start) * i as f64 / (n - 1) as f64).collect();
    MacroSeries::new(symbol, closes)
}
