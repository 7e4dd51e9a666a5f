//! Probability forecaster
//!
//! Factor scores become features in [-1, 1]; each horizon is a fixed linear
//! logit over the same features, squashed by a sigmoid. Raw probabilities
//! are then passed through the active affine calibration.

pub mod calibration;

pub use calibration::{CalibrationBin, CalibrationBuilder, CalibrationCache, CalibrationModel, ReferenceSeries};

use crate::factors::FactorSet;
use crate::score::round1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    ThreeDay,
    FiveDay,
    TwentyDay,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::ThreeDay, Horizon::FiveDay, Horizon::TwentyDay];

    pub fn bars(&self) -> usize {
        match self {
            Horizon::ThreeDay => 3,
            Horizon::FiveDay => 5,
            Horizon::TwentyDay => 20,
        }
    }

    /// Feature weights; the shortest horizon leans most on near-term opportunity
    fn weights(&self) -> HorizonWeights {
        match self {
            Horizon::ThreeDay => HorizonWeights {
                bias: 0.0,
                trend: 0.40,
                flow: 0.50,
                fundamental: 0.10,
                catalyst: 0.40,
                opportunity: 0.90,
            },
            Horizon::FiveDay => HorizonWeights {
                bias: 0.0,
                trend: 0.60,
                flow: 0.60,
                fundamental: 0.20,
                catalyst: 0.30,
                opportunity: 0.60,
            },
            Horizon::TwentyDay => HorizonWeights {
                bias: 0.0,
                trend: 0.90,
                flow: 0.50,
                fundamental: 0.50,
                catalyst: 0.15,
                opportunity: 0.20,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HorizonWeights {
    bias: f64,
    trend: f64,
    flow: f64,
    fundamental: f64,
    catalyst: f64,
    opportunity: f64,
}

const LARGE_MOVE_BIAS: f64 = -1.0;
const LARGE_MOVE_VOLATILITY: f64 = 1.6;
const LARGE_MOVE_CATALYST: f64 = 0.8;
const LARGE_MOVE_SPIKE: f64 = 0.6;
const LARGE_MOVE_GAP: f64 = 0.5;

/// Normalized forecaster features
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub trend: Option<f64>,
    pub flow: Option<f64>,
    pub fundamental: Option<f64>,
    pub catalyst: Option<f64>,
    pub opportunity: Option<f64>,
    pub volatility: Option<f64>,
    pub volume_spike: Option<f64>,
    pub gap: Option<f64>,
}

pub(crate) fn centered(score: Option<f64>) -> Option<f64> {
    score.map(|s| ((s - 50.0) / 50.0).clamp(-1.0, 1.0))
}

impl Features {
    pub fn from_factors(factors: &FactorSet) -> Self {
        let st = &factors.short_term;
        Self {
            trend: centered(factors.trend.value),
            flow: centered(factors.flow.value),
            fundamental: centered(factors.fundamental.value),
            catalyst: factors.catalyst.value.map(|c| (c / 100.0).clamp(-1.0, 1.0)),
            opportunity: centered(factors.opportunity.value),
            volatility: centered(factors.volatility.value),
            volume_spike: st.volume_spike_ratio.map(|r| ((r - 1.0) / 2.0).clamp(0.0, 1.0)),
            gap: st.gap_pct.map(|g| (g.abs() / 3.0).clamp(0.0, 1.0)),
        }
    }
}

/// One feature's share of a logit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    /// None when the feature was unavailable and contributed 0
    pub value: Option<f64>,
    pub weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonForecast {
    pub horizon: Horizon,
    pub logit: f64,
    pub raw_probability: f64,
    pub calibrated_probability: f64,
    pub contributions: Vec<FeatureContribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeMoveForecast {
    pub logit: f64,
    pub raw_probability: f64,
    /// Not calibrated; equals the raw probability
    pub calibrated_probability: f64,
    pub contributions: Vec<FeatureContribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub features: Features,
    pub horizons: Vec<HorizonForecast>,
    pub large_move: LargeMoveForecast,
    pub calibration: CalibrationModel,
}

impl Forecast {
    pub fn horizon(&self, h: Horizon) -> Option<&HorizonForecast> {
        self.horizons.iter().find(|f| f.horizon == h)
    }

    pub fn calibrated(&self, h: Horizon) -> Option<f64> {
        self.horizon(h).map(|f| f.calibrated_probability)
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Sigmoid probability in percent, one decimal
pub fn probability_pct(logit: f64) -> f64 {
    round1(sigmoid(logit) * 100.0)
}

fn contribution(feature: &str, value: Option<f64>, weight: f64) -> FeatureContribution {
    FeatureContribution {
        feature: feature.to_string(),
        value,
        weight,
        contribution: value.unwrap_or(0.0) * weight,
    }
}

fn horizon_contributions(features: &Features, horizon: Horizon) -> (f64, Vec<FeatureContribution>) {
    let w = horizon.weights();
    let parts = vec![
        contribution("trend", features.trend, w.trend),
        contribution("flow", features.flow, w.flow),
        // missing fundamentals count as neutral
        contribution("fundamental", features.fundamental, w.fundamental),
        contribution("catalyst", features.catalyst, w.catalyst),
        contribution("opportunity", features.opportunity, w.opportunity),
    ];
    let logit = w.bias + parts.iter().map(|p| p.contribution).sum::<f64>();
    (logit, parts)
}

/// Raw directional probability for one horizon; the calibration replay uses this alone
pub fn raw_probability(features: &Features, horizon: Horizon) -> f64 {
    probability_pct(horizon_contributions(features, horizon).0)
}

/// Forecast every horizon and apply `model` to the directional ones
pub fn forecast(factors: &FactorSet, model: &CalibrationModel) -> Forecast {
    let features = Features::from_factors(factors);

    let horizons = Horizon::ALL
        .iter()
        .map(|&h| {
            let (logit, contributions) = horizon_contributions(&features, h);
            let raw = probability_pct(logit);
            HorizonForecast {
                horizon: h,
                logit,
                raw_probability: raw,
                calibrated_probability: model.apply(raw),
                contributions,
            }
        })
        .collect();

    let parts = vec![
        contribution("volatility", features.volatility, LARGE_MOVE_VOLATILITY),
        contribution("catalyst_magnitude", features.catalyst.map(f64::abs), LARGE_MOVE_CATALYST),
        contribution("volume_spike", features.volume_spike, LARGE_MOVE_SPIKE),
        contribution("gap", features.gap, LARGE_MOVE_GAP),
    ];
    let logit = LARGE_MOVE_BIAS + parts.iter().map(|p| p.contribution).sum::<f64>();
    let raw = probability_pct(logit);

    Forecast {
        features,
        horizons,
        large_move: LargeMoveForecast {
            logit,
            raw_probability: raw,
            calibrated_probability: raw,
            contributions: parts,
        },
        calibration: model.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::{CatalystScore, ShortTermSignals};
    use crate::score::{FactorKind, FactorScore};
    use std::collections::BTreeSet;

    fn factor(kind: FactorKind, value: Option<f64>) -> FactorScore {
        FactorScore {
            kind,
            value,
            components: vec![],
            reasons: vec!["test".to_string()],
            risk_flags: BTreeSet::new(),
        }
    }

    fn factor_set(v: Option<f64>, catalyst: Option<f64>) -> FactorSet {
        FactorSet {
            trend: factor(FactorKind::Trend, v),
            flow: factor(FactorKind::Flow, v),
            fundamental: factor(FactorKind::Fundamental, None),
            volatility: factor(FactorKind::Volatility, v),
            opportunity: factor(FactorKind::ShortTermOpportunity, v),
            catalyst: CatalystScore {
                value: catalyst,
                headline_count: 1,
                reasons: vec![],
            },
            short_term: ShortTermSignals {
                pullback_risk: Some(20.0),
                breakout: Some(50.0),
                volume_spike_ratio: Some(2.0),
                gap_pct: Some(-1.5),
            },
        }
    }

    #[test]
    fn test_neutral_inputs_give_fifty() {
        let f = forecast(&factor_set(Some(50.0), Some(0.0)), &CalibrationModel::identity());
        for h in &f.horizons {
            assert_eq!(h.raw_probability, 50.0);
            assert_eq!(h.calibrated_probability, 50.0);
        }
    }

    #[test]
    fn test_identity_calibration_equals_raw() {
        let f = forecast(&factor_set(Some(72.0), Some(35.0)), &CalibrationModel::identity());
        for h in &f.horizons {
            assert_eq!(h.calibrated_probability, h.raw_probability);
            assert!(h.raw_probability > 50.0);
        }
    }

    #[test]
    fn test_probabilities_bounded_and_fundamental_counts_zero() {
        let f = forecast(&factor_set(Some(100.0), Some(100.0)), &CalibrationModel::identity());
        for h in &f.horizons {
            assert!((0.0..=100.0).contains(&h.raw_probability));
            let fund = h.contributions.iter().find(|c| c.feature == "fundamental").unwrap();
            assert_eq!(fund.value, None);
            assert_eq!(fund.contribution, 0.0);
        }
        assert!((0.0..=100.0).contains(&f.large_move.raw_probability));
    }

    #[test]
    fn test_short_horizon_leans_on_opportunity() {
        let mut set = factor_set(Some(50.0), Some(0.0));
        set.opportunity.value = Some(90.0);
        let f = forecast(&set, &CalibrationModel::identity());
        let p3 = f.calibrated(Horizon::ThreeDay).unwrap();
        let p20 = f.calibrated(Horizon::TwentyDay).unwrap();
        assert!(p3 > p20);
    }

    #[test]
    fn test_large_move_uses_volatility_inputs() {
        let f = forecast(&factor_set(Some(90.0), Some(-80.0)), &CalibrationModel::identity());
        // -1 + 1.6*0.8 + 0.8*0.8 + 0.6*0.5 + 0.5*0.5
        let expected = probability_pct(-1.0 + 1.28 + 0.64 + 0.3 + 0.25);
        assert_eq!(f.large_move.raw_probability, expected);
        assert_eq!(f.large_move.calibrated_probability, f.large_move.raw_probability);
    }

    #[test]
    fn test_affine_calibration_is_clamped() {
        let model = CalibrationModel {
            slope: 2.0,
            intercept: -10.0,
            ..CalibrationModel::identity()
        };
        let f = forecast(&factor_set(Some(100.0), Some(100.0)), &model);
        for h in &f.horizons {
            assert!(h.calibrated_probability <= 100.0);
        }
    }
}
