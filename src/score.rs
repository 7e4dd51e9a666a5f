//! Factor scores and the helpers every scorer shares
//!
//! A score is either a computed value in [0, 100] or unavailable. Fifty is a
//! legitimate computed value and is never used as a stand-in for missing data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Factor categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    Trend,
    Flow,
    Fundamental,
    Volatility,
    ShortTermOpportunity,
}

impl FactorKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            FactorKind::Trend => "Trend",
            FactorKind::Flow => "Institutional Flow",
            FactorKind::Fundamental => "Fundamental",
            FactorKind::Volatility => "Volatility",
            FactorKind::ShortTermOpportunity => "Short-Term Opportunity",
        }
    }
}

/// Informational risk tags. Flags never feed back into the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskFlag {
    Overheated,
    BreakdownRisk,
    MarginSpike,
    InstitutionalSelling,
    RevenueTurnedNegative,
    RevenueDeclineStreak,
    HighVolatility,
    VolumeSpike,
    GapChase,
    Extended,
}

impl RiskFlag {
    pub fn label(&self) -> &'static str {
        match self {
            RiskFlag::Overheated => "overheated",
            RiskFlag::BreakdownRisk => "breakdown-risk",
            RiskFlag::MarginSpike => "margin-spike",
            RiskFlag::InstitutionalSelling => "institutional-selling",
            RiskFlag::RevenueTurnedNegative => "revenue-turned-negative",
            RiskFlag::RevenueDeclineStreak => "revenue-decline-streak",
            RiskFlag::HighVolatility => "high-volatility",
            RiskFlag::VolumeSpike => "volume-spike",
            RiskFlag::GapChase => "gap-chase",
            RiskFlag::Extended => "extended",
        }
    }
}

/// One named sub-score of a factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub key: String,
    pub label: String,
    /// Domain feature before mapping (None when numerically unavailable)
    pub raw_value: Option<f64>,
    /// Feature mapped onto [0, 100]
    pub score: Option<f64>,
    /// Negative weights mark penalty terms
    pub weight: f64,
    /// Points this component added to (or removed from) the final value
    pub contribution: f64,
}

impl Component {
    pub fn new(key: &str, label: &str, raw_value: Option<f64>, score: Option<f64>, weight: f64) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            raw_value,
            score: score.and_then(clamp_score),
            weight,
            contribution: 0.0,
        }
    }

    /// Build a component by mapping `raw` through `map`
    pub fn mapped(key: &str, label: &str, raw: Option<f64>, weight: f64, map: impl Fn(f64) -> f64) -> Self {
        let score = raw.map(&map);
        Self::new(key, label, raw, score, weight)
    }

    pub fn is_penalty(&self) -> bool {
        self.weight < 0.0
    }
}

/// Single-category assessment with its breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub kind: FactorKind,
    pub value: Option<f64>,
    pub components: Vec<Component>,
    pub reasons: Vec<String>,
    pub risk_flags: BTreeSet<RiskFlag>,
}

impl FactorScore {
    /// Minimum-sample precondition failed
    pub fn insufficient(kind: FactorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            value: None,
            components: Vec::new(),
            reasons: vec![reason.into()],
            risk_flags: BTreeSet::new(),
        }
    }

    /// Combine components into a final value; reasons are ranked candidates
    pub fn from_components(
        kind: FactorKind,
        mut components: Vec<Component>,
        mut candidates: Vec<(u8, String)>,
        risk_flags: BTreeSet<RiskFlag>,
    ) -> Self {
        let value = combine(&mut components);
        let dropped: Vec<&str> = components
            .iter()
            .filter(|c| c.score.is_none())
            .map(|c| c.label.as_str())
            .collect();
        if !dropped.is_empty() {
            tracing::debug!(factor = ?kind, dropped = ?dropped, "partial factor inputs");
            candidates.push((90, format!("Partial data: {} unavailable", dropped.join(", "))));
        }
        if value.is_none() {
            candidates.insert(0, (0, format!("{} unavailable: no computable component", kind.display_name())));
        }
        Self {
            kind,
            value,
            components,
            reasons: top_reasons(candidates, 3),
            risk_flags,
        }
    }

    pub fn is_available(&self) -> bool {
        self.value.is_some()
    }

    pub fn component(&self, key: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.key == key)
    }
}

/// Weighted composite over factors; unavailable factors do not deflate it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub value: Option<f64>,
    /// Sum of the weights of available factors
    pub effective_weight: f64,
    pub dropped: Vec<FactorKind>,
}

impl CompositeScore {
    pub fn from_weighted(pairs: &[(&FactorScore, f64)]) -> Self {
        let mut num = 0.0;
        let mut den = 0.0;
        let mut dropped = Vec::new();
        for (score, weight) in pairs {
            match score.value {
                Some(v) if *weight > 0.0 => {
                    num += weight * v;
                    den += weight;
                }
                _ => dropped.push(score.kind),
            }
        }
        let value = if den > 0.0 { clamp_score(num / den) } else { None };
        Self {
            value,
            effective_weight: den,
            dropped,
        }
    }
}

/// Clamp to [0, 100]; non-finite input is unavailable
pub fn clamp_score(x: f64) -> Option<f64> {
    x.is_finite().then(|| x.clamp(0.0, 100.0))
}

/// Monotonic piecewise-linear map over `(x, y)` knots sorted by x; flat beyond the ends
pub fn piecewise(x: f64, knots: &[(f64, f64)]) -> f64 {
    let (first, last) = match (knots.first(), knots.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return x,
    };
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }
    for pair in knots.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x <= x1 {
            if (x1 - x0).abs() < f64::EPSILON {
                return y1;
            }
            return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
        }
    }
    last.1
}

/// Saturating map centred on 50
pub fn saturate(x: f64, scale: f64) -> f64 {
    50.0 + 50.0 * (x / scale).tanh()
}

/// Round to one decimal place
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Weighted average over available positive-weight components, then penalties.
/// Fills in each component's contribution.
pub fn combine(components: &mut [Component]) -> Option<f64> {
    let den: f64 = components
        .iter()
        .filter(|c| !c.is_penalty() && c.score.is_some())
        .map(|c| c.weight)
        .sum();
    if den <= 0.0 {
        for c in components.iter_mut() {
            c.contribution = 0.0;
        }
        return None;
    }
    let mut value = 0.0;
    for c in components.iter_mut().filter(|c| !c.is_penalty()) {
        c.contribution = match c.score {
            Some(s) => c.weight / den * s,
            None => 0.0,
        };
        value += c.contribution;
    }
    for c in components.iter_mut().filter(|c| c.is_penalty()) {
        c.contribution = match c.score {
            Some(s) => c.weight * (s - 50.0).max(0.0),
            None => 0.0,
        };
        value += c.contribution;
    }
    clamp_score(value)
}

/// Stable priority sort, de-duplicate, keep `limit`
pub fn top_reasons(mut candidates: Vec<(u8, String)>, limit: usize) -> Vec<String> {
    candidates.sort_by_key(|(priority, _)| *priority);
    let mut out: Vec<String> = Vec::with_capacity(limit);
    for (_, reason) in candidates {
        if out.len() == limit {
            break;
        }
        if !reason.is_empty() && !out.contains(&reason) {
            out.push(reason);
        }
    }
    out
}
