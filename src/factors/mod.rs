//! Factor scorers
//!
//! Each scorer is a pure function of the scoring context. Below its
//! minimum history a scorer returns an unavailable score with a reason.

use crate::config::AssessorConfig;
use crate::score::{FactorKind, FactorScore};
use crate::types::{Bar, FlowRecord, Headline, MarginRecord, RevenueRecord, SecurityInputs};
use chrono::{Datelike, NaiveDate};

pub mod catalyst;
pub mod flow;
pub mod fundamental;
pub mod opportunity;
pub mod trend;
pub mod volatility;

pub use catalyst::{CatalystScore, CatalystScorer};
pub use flow::FlowScorer;
pub use fundamental::FundamentalScorer;
pub use opportunity::{OpportunityScorer, ShortTermSignals};
pub use trend::TrendScorer;
pub use volatility::VolatilityScorer;

/// Borrowed, date-sorted records as of one point in time
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub bars: &'a [Bar],
    pub flows: &'a [FlowRecord],
    pub margins: &'a [MarginRecord],
    pub revenues: &'a [RevenueRecord],
    pub headlines: &'a [Headline],
    pub as_of: Option<NaiveDate>,
}

impl<'a> ScoringContext<'a> {
    pub fn from_inputs(inputs: &'a SecurityInputs) -> Self {
        Self {
            bars: &inputs.bars,
            flows: &inputs.flows,
            margins: &inputs.margins,
            revenues: &inputs.revenues,
            headlines: &inputs.headlines,
            as_of: inputs.effective_as_of(),
        }
    }

    /// Price-only context
    pub fn bars_only(bars: &'a [Bar]) -> Self {
        Self {
            bars,
            flows: &[],
            margins: &[],
            revenues: &[],
            headlines: &[],
            as_of: bars.last().map(|b| b.date),
        }
    }

    /// Point-in-time view at bar index `idx` (inclusive). Flow and margin
    /// records dated after that bar and revenue periods after its month are
    /// cut off. Headlines are kept whole; the catalyst scorer filters them
    /// by `as_of`.
    pub fn truncated(&self, idx: usize) -> Self {
        let bars = match self.bars.len() {
            0 => self.bars,
            n => &self.bars[..=idx.min(n - 1)],
        };
        let cutoff = bars.last().map(|b| b.date);
        let (flows, margins, revenues) = match cutoff {
            Some(date) => {
                let month = (date.year(), date.month());
                (
                    &self.flows[..self.flows.partition_point(|f| f.date <= date)],
                    &self.margins[..self.margins.partition_point(|m| m.date <= date)],
                    &self.revenues[..self.revenues.partition_point(|r| r.period() <= month)],
                )
            }
            None => (&self.flows[..0], &self.margins[..0], &self.revenues[..0]),
        };
        Self {
            bars,
            flows,
            margins,
            revenues,
            headlines: self.headlines,
            as_of: cutoff,
        }
    }
}

/// A single-category scorer
pub trait FactorScorer: Send + Sync {
    fn kind(&self) -> FactorKind;

    /// Minimum number of samples the scorer needs
    fn min_samples(&self) -> usize;

    fn score(&self, ctx: &ScoringContext<'_>) -> FactorScore;
}

/// All factor scores of one security
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FactorSet {
    pub trend: FactorScore,
    pub flow: FactorScore,
    pub fundamental: FactorScore,
    pub volatility: FactorScore,
    pub opportunity: FactorScore,
    pub catalyst: CatalystScore,
    pub short_term: ShortTermSignals,
}

impl FactorSet {
    pub fn scores(&self) -> [&FactorScore; 5] {
        [&self.trend, &self.flow, &self.fundamental, &self.volatility, &self.opportunity]
    }

    /// Union of all factor risk flags
    pub fn risk_flags(&self) -> std::collections::BTreeSet<crate::score::RiskFlag> {
        self.scores()
            .iter()
            .flat_map(|s| s.risk_flags.iter().copied())
            .collect()
    }
}

/// Runs every scorer with one configuration
#[derive(Debug, Clone)]
pub struct FactorSuite {
    pub trend: TrendScorer,
    pub flow: FlowScorer,
    pub fundamental: FundamentalScorer,
    pub volatility: VolatilityScorer,
    pub opportunity: OpportunityScorer,
    pub catalyst: CatalystScorer,
}

impl FactorSuite {
    pub fn new(config: &AssessorConfig) -> Self {
        let min = config.min_history;
        let t = config.thresholds;
        Self {
            trend: TrendScorer::new(min.trend_bars, t),
            flow: FlowScorer::new(min.flow_days, t),
            fundamental: FundamentalScorer::new(min.fundamental_months),
            volatility: VolatilityScorer::new(min.volatility_bars, t),
            opportunity: OpportunityScorer::new(min.opportunity_bars, t),
            catalyst: CatalystScorer::new(t.catalyst_window_days),
        }
    }

    pub fn score_all(&self, ctx: &ScoringContext<'_>) -> FactorSet {
        let (opportunity, short_term) = self.opportunity.score_with_signals(ctx);
        FactorSet {
            trend: self.trend.score(ctx),
            flow: self.flow.score(ctx),
            fundamental: self.fundamental.score(ctx),
            volatility: self.volatility.score(ctx),
            opportunity,
            catalyst: self.catalyst.score(ctx),
            short_term,
        }
    }
}

impl Default for FactorSuite {
    fn default() -> Self {
        Self::new(&AssessorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{bars_from_closes, trending_closes};

    #[test]
    fn test_truncated_cuts_revenue_after_cutoff_month() {
        // 2023-01-02 plus 40 days lands in February
        let bars = bars_from_closes(&trending_closes(60, 10.0, 0.1));
        let revenues: Vec<RevenueRecord> = (1..=6)
            .map(|month| RevenueRecord { year: 2023, month, yoy_growth_pct: month as f64 })
            .collect();
        let ctx = ScoringContext {
            revenues: &revenues,
            ..ScoringContext::bars_only(&bars)
        };
        let view = ctx.truncated(40);
        assert_eq!(view.as_of, Some(bars[40].date));
        assert_eq!(view.revenues.len(), 2);
        assert_eq!(view.revenues.last().map(|r| r.month), Some(2));
        assert_eq!(ctx.truncated(59).revenues.len(), 3);
    }

    #[test]
    fn test_truncated_empty_context() {
        let view = ScoringContext::bars_only(&[]).truncated(10);
        assert!(view.bars.is_empty());
        assert_eq!(view.as_of, None);
    }
}
