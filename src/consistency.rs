//! Directional consensus across factor signals
//!
//! Every available signal is mapped to a direction in [-1, 1]. The weighted
//! mean is the consensus; the weighted mean absolute deviation from it is the
//! disagreement. Unavailable signals are dropped from both sums.

use serde::{Deserialize, Serialize};

/// Directions weaker than this count as no lean
pub const LEAN_THRESHOLD: f64 = 0.15;
/// Directions at least this strong against consensus are contradictions
pub const CONTRADICTION_THRESHOLD: f64 = 0.40;

const SAME_SIGN_BONUS: f64 = 15.0;
const UNCLEAR_PENALTY: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Trend,
    Flow,
    Fundamental,
    Catalyst,
    ShortTermOpportunity,
    Forecast,
}

impl SignalSource {
    pub fn weight(&self) -> f64 {
        match self {
            SignalSource::Trend => 0.25,
            SignalSource::Flow => 0.20,
            SignalSource::Fundamental => 0.15,
            SignalSource::Catalyst => 0.10,
            SignalSource::ShortTermOpportunity => 0.15,
            SignalSource::Forecast => 0.15,
        }
    }
}

/// Raw inputs; `None` marks an unavailable signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyInputs {
    pub trend: Option<f64>,
    pub flow: Option<f64>,
    pub fundamental: Option<f64>,
    /// Native [-100, 100]
    pub catalyst: Option<f64>,
    pub short_term: Option<f64>,
    /// Forecast probability in [0, 100]
    pub forecast_probability: Option<f64>,
}

impl ConsistencyInputs {
    fn directions(&self) -> Vec<(SignalSource, f64)> {
        let score_dir = |s: f64| ((s - 50.0) / 25.0).clamp(-1.0, 1.0);
        let pairs = [
            (SignalSource::Trend, self.trend.map(score_dir)),
            (SignalSource::Flow, self.flow.map(score_dir)),
            (SignalSource::Fundamental, self.fundamental.map(score_dir)),
            (SignalSource::Catalyst, self.catalyst.map(|c| (c / 50.0).clamp(-1.0, 1.0))),
            (SignalSource::ShortTermOpportunity, self.short_term.map(score_dir)),
            (SignalSource::Forecast, self.forecast_probability.map(score_dir)),
        ];
        pairs
            .into_iter()
            .filter_map(|(src, d)| d.filter(|v| v.is_finite()).map(|v| (src, v)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusVerdict {
    Bullish,
    Bearish,
    Unclear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDirection {
    pub source: SignalSource,
    pub direction: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyResult {
    /// None when no signal is available
    pub score: Option<f64>,
    pub level: ConsistencyLevel,
    pub verdict: ConsensusVerdict,
    pub consensus: f64,
    pub disagreement: f64,
    pub same_sign_ratio: f64,
    pub signals: Vec<SignalDirection>,
    pub contradictions: Vec<SignalSource>,
}

pub fn evaluate(inputs: &ConsistencyInputs) -> ConsistencyResult {
    let dirs = inputs.directions();
    let total_weight: f64 = dirs.iter().map(|(s, _)| s.weight()).sum();
    if dirs.is_empty() || total_weight <= 0.0 {
        return ConsistencyResult {
            score: None,
            level: ConsistencyLevel::Low,
            verdict: ConsensusVerdict::Unclear,
            consensus: 0.0,
            disagreement: 0.0,
            same_sign_ratio: 0.5,
            signals: Vec::new(),
            contradictions: Vec::new(),
        };
    }

    let consensus = dirs.iter().map(|(s, d)| s.weight() * d).sum::<f64>() / total_weight;
    let disagreement = (dirs
        .iter()
        .map(|(s, d)| s.weight() * (d - consensus).abs())
        .sum::<f64>()
        / total_weight)
        .clamp(0.0, 1.0);

    let clear = consensus.abs() >= LEAN_THRESHOLD;
    let same_sign_ratio = if clear {
        let leaning: Vec<&(SignalSource, f64)> = dirs.iter().filter(|(_, d)| d.abs() >= LEAN_THRESHOLD).collect();
        let lean_weight: f64 = leaning.iter().map(|(s, _)| s.weight()).sum();
        let agree_weight: f64 = leaning
            .iter()
            .filter(|(_, d)| d.signum() == consensus.signum())
            .map(|(s, _)| s.weight())
            .sum();
        if lean_weight > 0.0 {
            agree_weight / lean_weight
        } else {
            0.5
        }
    } else {
        0.5
    };

    let bonus = ((same_sign_ratio - 0.5) / 0.5).clamp(0.0, 1.0);
    let penalty = if clear { 0.0 } else { 1.0 };
    let score = (100.0 * (1.0 - disagreement) + SAME_SIGN_BONUS * bonus - UNCLEAR_PENALTY * penalty).clamp(0.0, 100.0);

    let level = if score >= 75.0 {
        ConsistencyLevel::High
    } else if score >= 55.0 {
        ConsistencyLevel::Medium
    } else {
        ConsistencyLevel::Low
    };
    let verdict = if consensus >= LEAN_THRESHOLD {
        ConsensusVerdict::Bullish
    } else if consensus <= -LEAN_THRESHOLD {
        ConsensusVerdict::Bearish
    } else {
        ConsensusVerdict::Unclear
    };
    let contradictions = if clear {
        dirs.iter()
            .filter(|(_, d)| d.abs() >= CONTRADICTION_THRESHOLD && d.signum() != consensus.signum())
            .map(|(s, _)| *s)
            .collect()
    } else {
        Vec::new()
    };

    ConsistencyResult {
        score: Some(score),
        level,
        verdict,
        consensus,
        disagreement,
        same_sign_ratio,
        signals: dirs
            .iter()
            .map(|(s, d)| SignalDirection {
                source: *s,
                direction: *d,
                weight: s.weight(),
            })
            .collect(),
        contradictions,
    }
}
