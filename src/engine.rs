//! Assessor - per-security "compute everything" and macro entry points

use crate::backtest::{self, BacktestResult};
use crate::config::AssessorConfig;
use crate::consistency::{self, ConsistencyInputs, ConsistencyResult};
use crate::crash::{self, CrashRisk};
use crate::error::Result;
use crate::factors::{FactorSet, FactorSuite, ScoringContext};
use crate::forecast::{self, CalibrationBuilder, CalibrationCache, CalibrationModel, Forecast, Horizon};
use crate::score::CompositeScore;
use crate::strategy::{self, StrategyDecision, StrategyInputs};
use crate::types::{MacroSeries, SecurityInputs};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

const COMPOSITE_TREND: f64 = 0.30;
const COMPOSITE_FLOW: f64 = 0.25;
const COMPOSITE_FUNDAMENTAL: f64 = 0.20;
const COMPOSITE_OPPORTUNITY: f64 = 0.25;

/// Full assessment of one security
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityAssessment {
    pub symbol: String,
    pub as_of: Option<NaiveDate>,
    pub factors: FactorSet,
    pub composite: CompositeScore,
    pub consistency: ConsistencyResult,
    pub forecast: Forecast,
    pub decision: StrategyDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backtest: Option<BacktestResult>,
}

/// Runs scorers, aggregator, forecaster and selector with one configuration
#[derive(Debug, Clone)]
pub struct Assessor {
    config: AssessorConfig,
    suite: FactorSuite,
}

impl Assessor {
    /// Scorers raise any minimum below what their indicators need
    pub fn new(config: AssessorConfig) -> Self {
        let suite = FactorSuite::new(&config);
        Self { config, suite }
    }

    /// Like `new`, but rejects a configuration that fails validation
    pub fn try_new(config: AssessorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &AssessorConfig {
        &self.config
    }

    pub fn assess(&self, inputs: &SecurityInputs, model: &CalibrationModel) -> SecurityAssessment {
        let inputs = inputs.normalized();
        let ctx = ScoringContext::from_inputs(&inputs);
        let factors = self.suite.score_all(&ctx);

        let composite = CompositeScore::from_weighted(&[
            (&factors.trend, COMPOSITE_TREND),
            (&factors.flow, COMPOSITE_FLOW),
            (&factors.fundamental, COMPOSITE_FUNDAMENTAL),
            (&factors.opportunity, COMPOSITE_OPPORTUNITY),
        ]);
        let forecast = forecast::forecast(&factors, model);
        let consistency = consistency::evaluate(&ConsistencyInputs {
            trend: factors.trend.value,
            flow: factors.flow.value,
            fundamental: factors.fundamental.value,
            catalyst: factors.catalyst.value,
            short_term: factors.opportunity.value,
            forecast_probability: forecast.calibrated(Horizon::FiveDay),
        });
        let decision = strategy::select(&StrategyInputs::from_parts(&factors, &forecast, &consistency));

        info!(
            symbol = %inputs.symbol,
            composite = ?composite.value,
            rule = %decision.chosen_rule_id,
            "security assessed"
        );
        SecurityAssessment {
            symbol: inputs.symbol.clone(),
            as_of: ctx.as_of,
            factors,
            composite,
            consistency,
            forecast,
            decision,
            backtest: None,
        }
    }

    /// `assess` plus the flow/volume backtest over the configured window
    pub fn assess_with_backtest(&self, inputs: &SecurityInputs, model: &CalibrationModel) -> SecurityAssessment {
        let mut assessment = self.assess(inputs, model);
        let normalized = inputs.normalized();
        assessment.backtest = Some(backtest::evaluate(
            &normalized.bars,
            &normalized.flows,
            self.config.backtest.window_bars,
        ));
        assessment
    }

    pub fn crash_risk(&self, series: &[MacroSeries]) -> CrashRisk {
        crash::evaluate(series)
    }

    pub fn calibration_builder(&self) -> CalibrationBuilder {
        CalibrationBuilder::new(&self.config)
    }

    /// Empty cache with the configured validity window
    pub fn calibration_cache(&self) -> CalibrationCache {
        CalibrationCache::new(self.config.calibration.ttl_hours)
    }
}

impl Default for Assessor {
    fn default() -> Self {
        Self::new(AssessorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{bars_from_closes, flows_for, trending_closes};

    #[test]
    fn test_empty_inputs_are_all_unavailable() {
        let a = Assessor::default().assess(&SecurityInputs::default(), &CalibrationModel::identity());
        for s in a.factors.scores() {
            assert!(s.value.is_none());
            assert!(!s.reasons.is_empty());
        }
        assert_eq!(a.composite.value, None);
        assert_eq!(a.decision.chosen_rule_id, "wait_for_convergence");
        assert!(a.backtest.is_none());
    }

    #[test]
    fn test_uptrend_is_bullish() {
        let bars = bars_from_closes(&trending_closes(200, 20.0, 0.4));
        let flows = flows_for(&bars, |_| 4_000.0);
        let inputs = SecurityInputs {
            symbol: "UPT".to_string(),
            bars,
            flows,
            ..SecurityInputs::default()
        };
        let a = Assessor::default().assess_with_backtest(&inputs, &CalibrationModel::identity());
        assert!(a.composite.value.unwrap() > 60.0);
        assert!(a.forecast.calibrated(Horizon::TwentyDay).unwrap() > 50.0);
        assert_eq!(a.consistency.verdict, consistency::ConsensusVerdict::Bullish);
        assert_eq!(a.composite.dropped, vec![crate::score::FactorKind::Fundamental]);
        assert!(a.backtest.unwrap().bullish_days > 0);
    }

    fn short_minimums() -> AssessorConfig {
        let mut config = AssessorConfig::default();
        config.min_history.fundamental_months = 3;
        config.min_history.volatility_bars = 5;
        config.min_history.opportunity_bars = 2;
        config.min_history.trend_bars = 0;
        config.min_history.flow_days = 0;
        config
    }

    #[test]
    fn test_short_configured_minimums_fail_open() {
        let bars = bars_from_closes(&trending_closes(8, 20.0, 0.5));
        let flows = flows_for(&bars, |_| 1_000.0);
        let revenues = (1..=4)
            .map(|month| crate::types::RevenueRecord {
                year: 2023,
                month,
                yoy_growth_pct: 5.0,
            })
            .collect();
        let inputs = SecurityInputs {
            symbol: "SHORT".to_string(),
            bars,
            flows,
            revenues,
            ..SecurityInputs::default()
        };
        let a = Assessor::new(short_minimums()).assess(&inputs, &CalibrationModel::identity());
        assert_eq!(a.factors.fundamental.value, None);
        assert_eq!(a.factors.volatility.value, None);
        assert_eq!(a.factors.trend.value, None);
        assert_eq!(a.factors.opportunity.value, None);
        assert!(a.factors.fundamental.reasons[0].contains("need 6 months"));

        let empty = Assessor::new(short_minimums()).assess(&SecurityInputs::default(), &CalibrationModel::identity());
        assert!(empty.factors.scores().iter().all(|s| s.value.is_none()));
    }

    #[test]
    fn test_try_new_rejects_short_minimums() {
        assert!(matches!(
            Assessor::try_new(short_minimums()),
            Err(crate::error::AssessError::InvalidConfig(_))
        ));
        assert!(Assessor::try_new(AssessorConfig::default()).is_ok());
    }
}
