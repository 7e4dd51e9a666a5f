//! Trend factor
//!
//! Scores medium-term trend health from:
//! - moving-average alignment (5/20/60/120)
//! - 20-bar momentum
//! - RSI(14)
//! - MACD histogram slope

use super::{FactorScorer, ScoringContext};
use crate::config::Thresholds;
use crate::indicators::{closes, macd_histogram, period_return, rsi, safe_ratio, sma};
use crate::score::{piecewise, saturate, Component, FactorKind, FactorScore, RiskFlag};
use std::collections::BTreeSet;

/// Smallest history the 120-bar average can be computed on
pub const MIN_TREND_BARS: usize = 121;

const W_ALIGNMENT: f64 = 0.35;
const W_MOMENTUM: f64 = 0.25;
const W_RSI: f64 = 0.20;
const W_MACD: f64 = 0.20;

#[derive(Debug, Clone)]
pub struct TrendScorer {
    min_bars: usize,
    thresholds: Thresholds,
}

impl TrendScorer {
    pub fn new(min_bars: usize, thresholds: Thresholds) -> Self {
        Self {
            min_bars: min_bars.max(MIN_TREND_BARS),
            thresholds,
        }
    }
}

impl FactorScorer for TrendScorer {
    fn kind(&self) -> FactorKind {
        FactorKind::Trend
    }

    fn min_samples(&self) -> usize {
        self.min_bars
    }

    fn score(&self, ctx: &ScoringContext<'_>) -> FactorScore {
        let bars = ctx.bars;
        if bars.len() < self.min_bars {
            return FactorScore::insufficient(
                FactorKind::Trend,
                format!("Trend needs {} bars, have {}", self.min_bars, bars.len()),
            );
        }

        let closes = closes(bars);
        let close = closes[closes.len() - 1];
        let ma5 = sma(&closes, 5);
        let ma20 = sma(&closes, 20);
        let ma60 = sma(&closes, 60);
        let ma120 = sma(&closes, 120);

        let mut candidates: Vec<(u8, String)> = Vec::new();
        let mut flags = BTreeSet::new();

        // Alignment: 25 points per ordered pair
        let alignment = match (ma5, ma20, ma60, ma120) {
            (Some(m5), Some(m20), Some(m60), Some(m120)) => {
                let checks = [close > m20, m5 > m20, m20 > m60, m60 > m120];
                let passed = checks.iter().filter(|c| **c).count();
                if passed == 4 {
                    candidates.push((1, "Moving averages fully aligned bullish (5>20>60>120)".to_string()));
                } else if passed == 0 {
                    candidates.push((1, "Moving averages fully aligned bearish".to_string()));
                } else {
                    candidates.push((5, format!("Mixed moving-average alignment ({}/4)", passed)));
                }
                Some(passed as f64)
            }
            _ => None,
        };

        let momentum = period_return(&closes, 20);
        if let Some(r) = momentum {
            if r >= 8.0 {
                candidates.push((2, format!("Strong 20-day momentum {:+.1}%", r)));
            } else if r <= -8.0 {
                candidates.push((2, format!("Weak 20-day momentum {:+.1}%", r)));
            }
        }

        let rsi14 = rsi(&closes, 14);
        if let Some(v) = rsi14 {
            if v >= self.thresholds.rsi_overheated {
                flags.insert(RiskFlag::Overheated);
                candidates.push((3, format!("RSI {:.1} overheated", v)));
            } else if v <= 30.0 {
                candidates.push((3, format!("RSI {:.1} oversold", v)));
            }
        }

        let hist = macd_histogram(&closes);
        let macd_slope = if hist.len() >= 4 {
            let last = hist[hist.len() - 1];
            let prev = hist[hist.len() - 4];
            safe_ratio(last - prev, close).map(|s| s * 100.0)
        } else {
            None
        };
        if let Some(s) = macd_slope {
            if s > 0.2 {
                candidates.push((4, "MACD histogram expanding".to_string()));
            } else if s < -0.2 {
                candidates.push((4, "MACD histogram contracting".to_string()));
            }
        }

        if let (Some(m60), Some(r)) = (ma60, momentum) {
            if close < m60 && r <= self.thresholds.breakdown_return_pct {
                flags.insert(RiskFlag::BreakdownRisk);
                candidates.push((0, format!("Price below MA60 after {:+.1}% slide", r)));
            }
        }

        let components = vec![
            Component::mapped("ma_alignment", "MA alignment", alignment, W_ALIGNMENT, |n| n * 25.0),
            Component::mapped("momentum_20d", "20-day momentum", momentum, W_MOMENTUM, |r| {
                piecewise(r, &[(-15.0, 0.0), (0.0, 50.0), (15.0, 100.0)])
            }),
            Component::mapped("rsi_14", "RSI(14)", rsi14, W_RSI, |v| {
                piecewise(v, &[(20.0, 0.0), (50.0, 50.0), (80.0, 100.0)])
            }),
            Component::mapped("macd_slope", "MACD histogram slope", macd_slope, W_MACD, |s| saturate(s, 0.5)),
        ];

        FactorScore::from_components(FactorKind::Trend, components, candidates, flags)
    }
}
