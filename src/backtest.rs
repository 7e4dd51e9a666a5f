//! Discrete flow/volume rule replayed over recent history
//!
//! Independent of the forecaster. A day is bullish when institutions were net
//! buyers, the close rose and volume was at least its recent average; bearish
//! is the mirror image. Neutral days are not scored.

use crate::factors::flow::daily_institutional;
use crate::types::{Bar, FlowRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Forward horizons, in bars
pub const HORIZONS: [usize; 2] = [3, 5];

const VOLUME_LOOKBACK: usize = 20;
const MIN_VOLUME_HISTORY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaySignal {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonHits {
    pub horizon: usize,
    pub samples: usize,
    pub hits: usize,
    /// None when no day could be scored
    pub hit_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub window_bars: usize,
    pub bullish_days: usize,
    pub bearish_days: usize,
    pub horizons: Vec<HorizonHits>,
}

impl BacktestResult {
    pub fn horizon(&self, h: usize) -> Option<&HorizonHits> {
        self.horizons.iter().find(|x| x.horizon == h)
    }
}

/// Signal for bar `i` given the institutional net of that date
pub fn classify(bars: &[Bar], i: usize, institutional_net: Option<f64>) -> DaySignal {
    if i < MIN_VOLUME_HISTORY {
        return DaySignal::Neutral;
    }
    let net = match institutional_net {
        Some(n) if n != 0.0 => n,
        _ => return DaySignal::Neutral,
    };
    let prior = &bars[i.saturating_sub(VOLUME_LOOKBACK)..i];
    let avg_volume = prior.iter().map(|b| b.volume).sum::<f64>() / prior.len() as f64;
    if !avg_volume.is_finite() || bars[i].volume < avg_volume {
        return DaySignal::Neutral;
    }

    let change = bars[i].close - bars[i - 1].close;
    if net > 0.0 && change > 0.0 {
        DaySignal::Bullish
    } else if net < 0.0 && change < 0.0 {
        DaySignal::Bearish
    } else {
        DaySignal::Neutral
    }
}

/// Replay the last `window` bars. Inputs must be date-sorted.
pub fn evaluate(bars: &[Bar], flows: &[FlowRecord], window: usize) -> BacktestResult {
    let net_by_date: HashMap<NaiveDate, f64> = daily_institutional(flows)
        .into_iter()
        .map(|d| (d.date, d.net))
        .collect();

    let start = bars.len().saturating_sub(window);
    let mut bullish_days = 0;
    let mut bearish_days = 0;
    let mut tallies = [(0usize, 0usize); HORIZONS.len()];

    for i in start..bars.len() {
        let signal = classify(bars, i, net_by_date.get(&bars[i].date).copied());
        match signal {
            DaySignal::Bullish => bullish_days += 1,
            DaySignal::Bearish => bearish_days += 1,
            DaySignal::Neutral => continue,
        }
        for (slot, &h) in tallies.iter_mut().zip(HORIZONS.iter()) {
            let Some(future) = bars.get(i + h) else { continue };
            slot.0 += 1;
            let hit = match signal {
                DaySignal::Bullish => future.close > bars[i].close,
                _ => future.close < bars[i].close,
            };
            if hit {
                slot.1 += 1;
            }
        }
    }

    let horizons = HORIZONS
        .iter()
        .zip(tallies)
        .map(|(&horizon, (samples, hits))| HorizonHits {
            horizon,
            samples,
            hits,
            hit_rate: (samples > 0).then(|| hits as f64 / samples as f64 * 100.0),
        })
        .collect();

    tracing::debug!(bullish_days, bearish_days, window, "backtest replayed");
    BacktestResult {
        window_bars: bars.len() - start,
        bullish_days,
        bearish_days,
        horizons,
    }
}
