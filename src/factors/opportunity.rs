//! Short-term opportunity factor
//!
//! Looks at the last few sessions: 5-bar return, where the close sits in the
//! prior 20-bar range, volume confirmation and the opening gap. Extension
//! above MA20 enters as a penalty through the pullback-risk score. The
//! auxiliary pullback/breakout readings are exported for the strategy rules.

use super::{FactorScorer, ScoringContext};
use crate::config::Thresholds;
use crate::indicators::{closes, pct_change, period_return, prior_range, rsi, safe_ratio, sma, volume_ratio};
use crate::score::{clamp_score, piecewise, Component, FactorKind, FactorScore, RiskFlag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const W_RETURN_5D: f64 = 0.30;
const W_RANGE: f64 = 0.30;
const W_VOLUME: f64 = 0.25;
const W_GAP: f64 = 0.15;
const W_PULLBACK_PENALTY: f64 = -0.20;

const RANGE_BARS: usize = 20;

/// The prior range plus the latest bar
pub const MIN_OPPORTUNITY_BARS: usize = RANGE_BARS + 1;

/// Auxiliary short-term readings shared with the forecaster and strategy rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShortTermSignals {
    /// 0-100, likelihood of a near-term pullback from extension
    pub pullback_risk: Option<f64>,
    /// 0-100, strength of a range breakout
    pub breakout: Option<f64>,
    /// Latest volume over the prior 20-bar mean
    pub volume_spike_ratio: Option<f64>,
    /// Latest opening gap in percent
    pub gap_pct: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct OpportunityScorer {
    min_bars: usize,
    thresholds: Thresholds,
}

impl OpportunityScorer {
    pub fn new(min_bars: usize, thresholds: Thresholds) -> Self {
        Self {
            min_bars: min_bars.max(MIN_OPPORTUNITY_BARS),
            thresholds,
        }
    }

    /// Score plus the auxiliary signals computed on the way
    pub fn score_with_signals(&self, ctx: &ScoringContext<'_>) -> (FactorScore, ShortTermSignals) {
        let bars = ctx.bars;
        if bars.len() < self.min_bars {
            let reason = format!("Short-term opportunity needs {} bars, have {}", self.min_bars, bars.len());
            return (
                FactorScore::insufficient(FactorKind::ShortTermOpportunity, reason),
                ShortTermSignals::default(),
            );
        }

        let closes = closes(bars);
        let last = bars[bars.len() - 1];
        let prev_close = closes[closes.len() - 2];

        let return_5d = period_return(&closes, 5);
        let range_position = prior_range(bars, RANGE_BARS)
            .and_then(|(low, high)| safe_ratio(last.close - low, high - low));
        let vol_ratio = volume_ratio(bars, RANGE_BARS);
        let gap = last.gap_pct(prev_close);
        let up_day = last.close >= prev_close;

        let extension = sma(&closes, 20).and_then(|m| pct_change(m, last.close));
        let rsi6 = rsi(&closes, 6);
        let pullback_risk = match (extension, rsi6) {
            (Some(e), Some(r)) => clamp_score(
                0.6 * piecewise(e, &[(0.0, 0.0), (5.0, 50.0), (15.0, 100.0)])
                    + 0.4 * piecewise(r, &[(50.0, 0.0), (90.0, 100.0)]),
            ),
            _ => None,
        };
        let breakout = match (range_position, vol_ratio) {
            (Some(p), Some(v)) => clamp_score(60.0 * p.clamp(0.0, 1.0) + 40.0 * (v / 2.0).min(1.0)),
            _ => None,
        };

        let mut candidates: Vec<(u8, String)> = Vec::new();
        let mut flags = BTreeSet::new();

        if let Some(r) = return_5d {
            if r.abs() >= 4.0 {
                candidates.push((2, format!("5-day move {:+.1}%", r)));
            }
        }
        if let Some(p) = range_position {
            if p > 1.0 {
                candidates.push((1, "Close above the prior 20-day high".to_string()));
            } else if p < 0.0 {
                candidates.push((1, "Close below the prior 20-day low".to_string()));
            }
        }
        if let Some(v) = vol_ratio {
            if v >= self.thresholds.volume_spike_ratio {
                flags.insert(RiskFlag::VolumeSpike);
                let direction = if up_day { "up" } else { "down" };
                candidates.push((0, format!("Volume {:.1}x average on an {} day", v, direction)));
            }
        }
        if let Some(g) = gap {
            if g >= self.thresholds.gap_chase_pct {
                flags.insert(RiskFlag::GapChase);
                candidates.push((3, format!("Opened {:+.1}% gap: avoid chasing", g)));
            } else if g <= -self.thresholds.gap_chase_pct {
                candidates.push((3, format!("Opened {:+.1}% gap down", g)));
            }
        }
        if let Some(e) = extension {
            if e >= self.thresholds.extended_pct {
                flags.insert(RiskFlag::Extended);
                candidates.push((1, format!("Extended {:.1}% above MA20", e)));
            }
        }

        let components = vec![
            Component::mapped("return_5d", "5-day return", return_5d, W_RETURN_5D, |r| {
                piecewise(r, &[(-8.0, 0.0), (0.0, 50.0), (8.0, 100.0)])
            }),
            Component::mapped("range_position", "Position in 20-day range", range_position, W_RANGE, |p| {
                p * 100.0
            }),
            Component::mapped("volume_confirmation", "Volume confirmation", vol_ratio, W_VOLUME, |v| {
                let s = piecewise(v, &[(0.5, 30.0), (1.0, 50.0), (2.5, 100.0)]);
                if up_day {
                    s
                } else {
                    100.0 - s
                }
            }),
            Component::mapped("opening_gap", "Opening gap", gap, W_GAP, |g| {
                piecewise(g, &[(-3.0, 0.0), (0.0, 50.0), (3.0, 100.0)])
            }),
            Component::new(
                "pullback_penalty",
                "Pullback risk",
                extension,
                pullback_risk,
                W_PULLBACK_PENALTY,
            ),
        ];

        let score = FactorScore::from_components(FactorKind::ShortTermOpportunity, components, candidates, flags);
        let signals = ShortTermSignals {
            pullback_risk,
            breakout,
            volume_spike_ratio: vol_ratio,
            gap_pct: gap,
        };
        (score, signals)
    }
}

impl FactorScorer for OpportunityScorer {
    fn kind(&self) -> FactorKind {
        FactorKind::ShortTermOpportunity
    }

    fn min_samples(&self) -> usize {
        self.min_bars
    }

    fn score(&self, ctx: &ScoringContext<'_>) -> FactorScore {
        self.score_with_signals(ctx).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{bars_from_closes, choppy_closes, trending_closes};

    fn scorer() -> OpportunityScorer {
        OpportunityScorer::new(30, Thresholds::default())
    }

    #[test]
    fn test_short_history_has_no_signals() {
        let bars = bars_from_closes(&trending_closes(29, 10.0, 0.2));
        let (score, signals) = scorer().score_with_signals(&ScoringContext::bars_only(&bars));
        assert!(score.value.is_none());
        assert_eq!(signals, ShortTermSignals::default());
    }

    #[test]
    fn test_small_minimum_covers_prior_range() {
        let small = OpportunityScorer::new(2, Thresholds::default());
        assert_eq!(small.min_samples(), MIN_OPPORTUNITY_BARS);
        let bars = bars_from_closes(&trending_closes(5, 10.0, 0.2));
        let (score, signals) = small.score_with_signals(&ScoringContext::bars_only(&bars));
        assert!(score.value.is_none());
        assert_eq!(signals, ShortTermSignals::default());
        let bars = bars_from_closes(&trending_closes(21, 10.0, 0.2));
        assert!(small.score(&ScoringContext::bars_only(&bars)).value.is_some());
    }

    #[test]
    fn test_breakout_on_volume() {
        let mut closes = choppy_closes(40, 100.0, 1.0);
        closes.push(106.0);
        let mut bars = bars_from_closes(&closes);
        let last = bars.len() - 1;
        bars[last].volume = 3_500_000.0;
        bars[last].open = 104.0;
        let (score, signals) = scorer().score_with_signals(&ScoringContext::bars_only(&bars));
        assert!(score.value.unwrap() > 60.0);
        assert!(signals.breakout.unwrap() >= 90.0);
        assert!(score.risk_flags.contains(&RiskFlag::VolumeSpike));
        assert!(score.risk_flags.contains(&RiskFlag::GapChase));
        let vol = signals.volume_spike_ratio.unwrap();
        assert!((vol - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_extended_run_carries_pullback_risk() {
        let bars = bars_from_closes(&trending_closes(60, 10.0, 1.5));
        let (score, signals) = scorer().score_with_signals(&ScoringContext::bars_only(&bars));
        assert!(signals.pullback_risk.unwrap() > 60.0);
        assert!(score.risk_flags.contains(&RiskFlag::Extended));
        let penalty = score.component("pullback_penalty").unwrap();
        assert!(penalty.contribution < 0.0);
    }
}
