//! Fundamental factor from monthly revenue growth

use super::{FactorScorer, ScoringContext};
use crate::score::{piecewise, Component, FactorKind, FactorScore, RiskFlag};
use std::collections::BTreeSet;

const W_YOY_AVERAGE: f64 = 0.60;
const W_YOY_TREND: f64 = 0.40;

/// Two consecutive quarters of monthly growth
pub const MIN_FUNDAMENTAL_MONTHS: usize = 6;

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    m.is_finite().then_some(m)
}

#[derive(Debug, Clone)]
pub struct FundamentalScorer {
    min_months: usize,
}

impl FundamentalScorer {
    pub fn new(min_months: usize) -> Self {
        Self {
            min_months: min_months.max(MIN_FUNDAMENTAL_MONTHS),
        }
    }
}

impl FactorScorer for FundamentalScorer {
    fn kind(&self) -> FactorKind {
        FactorKind::Fundamental
    }

    fn min_samples(&self) -> usize {
        self.min_months
    }

    fn score(&self, ctx: &ScoringContext<'_>) -> FactorScore {
        let yoy: Vec<f64> = ctx
            .revenues
            .iter()
            .map(|r| r.yoy_growth_pct)
            .filter(|v| v.is_finite())
            .collect();
        if yoy.len() < self.min_months {
            return FactorScore::insufficient(
                FactorKind::Fundamental,
                format!("Fundamentals need {} months of revenue, have {}", self.min_months, yoy.len()),
            );
        }

        let n = yoy.len();
        let avg6 = mean(&yoy[n - 6..]);
        let recent3 = mean(&yoy[n - 3..]);
        let prior3 = mean(&yoy[n - 6..n - 3]);
        let trend = match (recent3, prior3) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        };

        let mut candidates: Vec<(u8, String)> = Vec::new();
        let mut flags = BTreeSet::new();

        let latest = yoy[n - 1];
        let previous = yoy[n - 2];
        if latest < 0.0 && previous >= 0.0 {
            flags.insert(RiskFlag::RevenueTurnedNegative);
            candidates.push((0, format!("Revenue growth turned negative ({:+.1}% YoY)", latest)));
        }
        if yoy[n - 3..].iter().all(|v| *v < 0.0) {
            flags.insert(RiskFlag::RevenueDeclineStreak);
            candidates.push((1, "Revenue declining three months running".to_string()));
        }
        if let Some(a) = avg6 {
            if a >= 20.0 {
                candidates.push((2, format!("Strong revenue growth, 6-month average {:+.1}% YoY", a)));
            } else if a < 0.0 {
                candidates.push((2, format!("Revenue shrinking, 6-month average {:+.1}% YoY", a)));
            } else {
                candidates.push((4, format!("Revenue growth 6-month average {:+.1}% YoY", a)));
            }
        }
        if let Some(t) = trend {
            if t >= 5.0 {
                candidates.push((3, format!("Revenue growth accelerating ({:+.1} pts)", t)));
            } else if t <= -5.0 {
                candidates.push((3, format!("Revenue growth decelerating ({:+.1} pts)", t)));
            }
        }

        let components = vec![
            Component::mapped("yoy_average_6m", "6-month average YoY", avg6, W_YOY_AVERAGE, |a| {
                piecewise(a, &[(-20.0, 0.0), (0.0, 40.0), (20.0, 75.0), (50.0, 100.0)])
            }),
            Component::mapped("yoy_trend", "YoY trend (3m vs prior 3m)", trend, W_YOY_TREND, |t| {
                piecewise(t, &[(-20.0, 0.0), (0.0, 50.0), (20.0, 100.0)])
            }),
        ];

        FactorScore::from_components(FactorKind::Fundamental, components, candidates, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RevenueRecord;

    fn revenues(yoy: &[f64]) -> Vec<RevenueRecord> {
        yoy.iter()
            .enumerate()
            .map(|(i, v)| RevenueRecord {
                year: 2023 + (i / 12) as i32,
                month: (i % 12) as u32 + 1,
                yoy_growth_pct: *v,
            })
            .collect()
    }

    fn score(yoy: &[f64]) -> FactorScore {
        let revs = revenues(yoy);
        let ctx = ScoringContext { revenues: &revs, ..ScoringContext::bars_only(&[]) };
        FundamentalScorer::new(8).score(&ctx)
    }

    #[test]
    fn test_seven_months_is_unavailable() {
        let s = score(&[10.0; 7]);
        assert_eq!(s.value, None);
        assert!(!s.reasons.is_empty());
    }

    #[test]
    fn test_small_minimum_is_raised_to_two_quarters() {
        let scorer = FundamentalScorer::new(3);
        assert_eq!(scorer.min_samples(), MIN_FUNDAMENTAL_MONTHS);
        let revs = revenues(&[4.0, 5.0, 6.0, 7.0]);
        let ctx = ScoringContext { revenues: &revs, ..ScoringContext::bars_only(&[]) };
        let s = scorer.score(&ctx);
        assert_eq!(s.value, None);
        assert_eq!(s.reasons[0], "Fundamentals need 6 months of revenue, have 4");

        let revs = revenues(&[4.0; 6]);
        let ctx = ScoringContext { revenues: &revs, ..ScoringContext::bars_only(&[]) };
        assert!(scorer.score(&ctx).value.is_some());
    }

    #[test]
    fn test_flat_zero_growth_is_computed() {
        let s = score(&[0.0; 8]);
        // 0.6 * 40 + 0.4 * 50
        assert!((s.value.unwrap() - 44.0).abs() < 1e-9);
    }

    #[test]
    fn test_turned_negative_flag() {
        let s = score(&[12.0, 10.0, 9.0, 8.0, 6.0, 5.0, 2.0, -3.0]);
        assert!(s.risk_flags.contains(&RiskFlag::RevenueTurnedNegative));
        assert!(!s.risk_flags.contains(&RiskFlag::RevenueDeclineStreak));
        assert_eq!(s.reasons[0], "Revenue growth turned negative (-3.0% YoY)");
    }

    #[test]
    fn test_accelerating_growth_scores_high() {
        let s = score(&[5.0, 5.0, 5.0, 10.0, 12.0, 14.0, 30.0, 35.0, 40.0]);
        assert!(s.value.unwrap() > 70.0);
    }
}
