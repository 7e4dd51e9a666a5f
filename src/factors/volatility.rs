//! Volatility factor. Higher values mean a more volatile security.

use super::{FactorScorer, ScoringContext};
use crate::config::Thresholds;
use crate::indicators::{atr, closes, daily_returns, safe_ratio, std_dev};
use crate::score::{piecewise, Component, FactorKind, FactorScore, RiskFlag};
use std::collections::BTreeSet;

const W_ATR: f64 = 0.50;
const W_REALIZED: f64 = 0.30;
const W_GAPS: f64 = 0.20;

const TRADING_DAYS: f64 = 252.0;

/// 20 daily returns need 21 closes
pub const MIN_VOLATILITY_BARS: usize = 21;

#[derive(Debug, Clone)]
pub struct VolatilityScorer {
    min_bars: usize,
    thresholds: Thresholds,
}

impl VolatilityScorer {
    pub fn new(min_bars: usize, thresholds: Thresholds) -> Self {
        Self {
            min_bars: min_bars.max(MIN_VOLATILITY_BARS),
            thresholds,
        }
    }
}

impl FactorScorer for VolatilityScorer {
    fn kind(&self) -> FactorKind {
        FactorKind::Volatility
    }

    fn min_samples(&self) -> usize {
        self.min_bars
    }

    fn score(&self, ctx: &ScoringContext<'_>) -> FactorScore {
        let bars = ctx.bars;
        if bars.len() < self.min_bars {
            return FactorScore::insufficient(
                FactorKind::Volatility,
                format!("Volatility needs {} bars, have {}", self.min_bars, bars.len()),
            );
        }

        let closes = closes(bars);
        let close = closes[closes.len() - 1];
        let atr_pct = atr(bars, 14).and_then(|a| safe_ratio(a, close)).map(|r| r * 100.0);
        let realized = daily_returns(&closes, 20)
            .and_then(|r| std_dev(&r))
            .map(|sd| sd * TRADING_DAYS.sqrt() * 100.0);
        let gaps: Option<Vec<f64>> = (bars.len() - 10..bars.len())
            .map(|i| bars[i].gap_pct(bars[i - 1].close).map(f64::abs))
            .collect();
        let gap_activity = gaps.and_then(|g| safe_ratio(g.iter().sum(), g.len() as f64));

        let mut candidates: Vec<(u8, String)> = Vec::new();
        let mut flags = BTreeSet::new();
        if let Some(a) = atr_pct {
            if a >= self.thresholds.high_volatility_atr_pct {
                flags.insert(RiskFlag::HighVolatility);
                candidates.push((0, format!("ATR {:.1}% of price: high volatility", a)));
            } else if a <= 1.5 {
                candidates.push((2, format!("ATR {:.1}% of price: quiet range", a)));
            } else {
                candidates.push((3, format!("ATR {:.1}% of price", a)));
            }
        }
        if let Some(v) = realized {
            candidates.push((1, format!("20-day realized volatility {:.0}% annualized", v)));
        }
        if let Some(g) = gap_activity {
            if g >= 1.5 {
                candidates.push((2, format!("Frequent opening gaps (avg {:.1}%)", g)));
            }
        }

        let components = vec![
            Component::mapped("atr_pct", "ATR % of price", atr_pct, W_ATR, |a| {
                piecewise(a, &[(1.0, 0.0), (3.0, 50.0), (6.0, 100.0)])
            }),
            Component::mapped("realized_vol_20d", "20-day realized volatility", realized, W_REALIZED, |v| {
                piecewise(v, &[(10.0, 0.0), (30.0, 50.0), (60.0, 100.0)])
            }),
            Component::mapped("gap_activity_10d", "Opening gap activity", gap_activity, W_GAPS, |g| {
                piecewise(g, &[(0.2, 0.0), (1.0, 50.0), (3.0, 100.0)])
            }),
        ];

        FactorScore::from_components(FactorKind::Volatility, components, candidates, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{bars_from_closes, choppy_closes, trending_closes};

    fn scorer() -> VolatilityScorer {
        VolatilityScorer::new(60, Thresholds::default())
    }

    #[test]
    fn test_short_history_unavailable() {
        let bars = bars_from_closes(&trending_closes(59, 20.0, 0.1));
        let s = scorer().score(&ScoringContext::bars_only(&bars));
        assert!(s.value.is_none());
        assert!(!s.reasons.is_empty());
    }

    #[test]
    fn test_small_minimum_still_needs_a_return_window() {
        let small = VolatilityScorer::new(5, Thresholds::default());
        assert_eq!(small.min_samples(), MIN_VOLATILITY_BARS);
        let bars = bars_from_closes(&trending_closes(8, 20.0, 0.3));
        let s = small.score(&ScoringContext::bars_only(&bars));
        assert!(s.value.is_none());
        assert!(s.reasons[0].contains("21 bars"));
        assert!(small.score(&ScoringContext::bars_only(&[])).value.is_none());
    }

    #[test]
    fn test_choppy_is_more_volatile_than_calm() {
        let calm = bars_from_closes(&trending_closes(80, 20.0, 0.05));
        let wild = bars_from_closes(&choppy_closes(80, 20.0, 4.0));
        let calm_score = scorer().score(&ScoringContext::bars_only(&calm)).value.unwrap();
        let wild = scorer().score(&ScoringContext::bars_only(&wild));
        assert!(wild.value.unwrap() > calm_score);
        assert!(wild.risk_flags.contains(&RiskFlag::HighVolatility));
    }
}
