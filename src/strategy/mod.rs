//! Strategy selector
//!
//! An ordered rule table over the full feature set. Rules are evaluated top
//! to bottom and the first matching predicate decides signal, mode and the
//! action card. The last rule always matches, so exactly one rule fires.
//! A predicate that needs a missing number does not match.

pub mod signal;

pub use signal::{SignalStrength, SignalType, StrategyMode};

use crate::consistency::{ConsensusVerdict, ConsistencyResult};
use crate::factors::FactorSet;
use crate::forecast::{Forecast, Horizon};
use crate::score::{round1, RiskFlag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Everything the rules look at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyInputs {
    pub trend: Option<f64>,
    pub flow: Option<f64>,
    pub opportunity: Option<f64>,
    pub volatility: Option<f64>,
    pub pullback_risk: Option<f64>,
    pub breakout: Option<f64>,
    pub catalyst: Option<f64>,
    pub p3: Option<f64>,
    pub p5: Option<f64>,
    pub p20: Option<f64>,
    pub large_move: Option<f64>,
    pub consistency: Option<f64>,
    pub verdict: Option<ConsensusVerdict>,
    pub risk_flags: BTreeSet<RiskFlag>,
}

impl StrategyInputs {
    pub fn from_parts(factors: &FactorSet, forecast: &Forecast, consistency: &ConsistencyResult) -> Self {
        Self {
            trend: factors.trend.value,
            flow: factors.flow.value,
            opportunity: factors.opportunity.value,
            volatility: factors.volatility.value,
            pullback_risk: factors.short_term.pullback_risk,
            breakout: factors.short_term.breakout,
            catalyst: factors.catalyst.value,
            p3: forecast.calibrated(Horizon::ThreeDay),
            p5: forecast.calibrated(Horizon::FiveDay),
            p20: forecast.calibrated(Horizon::TwentyDay),
            large_move: Some(forecast.large_move.calibrated_probability),
            consistency: consistency.score,
            verdict: Some(consistency.verdict),
            risk_flags: factors.risk_flags(),
        }
    }

    fn has(&self, flag: RiskFlag) -> bool {
        self.risk_flags.contains(&flag)
    }
}

/// Entry conditions, invalidation, risk notes and plan for the chosen rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCard {
    pub title: String,
    pub conditions: Vec<String>,
    pub invalidation: Vec<String>,
    pub risk_notes: Vec<String>,
    pub plan: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub chosen_rule_id: String,
    pub mode: StrategyMode,
    pub signal: SignalType,
    pub strength: SignalStrength,
    pub confidence: f64,
    pub action_card: ActionCard,
}

struct Rule {
    id: &'static str,
    signal: SignalType,
    mode: StrategyMode,
    applies: fn(&StrategyInputs) -> bool,
    card: fn(&StrategyInputs) -> Card,
}

/// Rule-specific card lines; risk notes are filled in by the selector
struct Card {
    conditions: Vec<String>,
    invalidation: Vec<String>,
    plan: Vec<String>,
}

fn at_least(v: Option<f64>, threshold: f64) -> bool {
    matches!(v, Some(x) if x >= threshold)
}

fn at_most(v: Option<f64>, threshold: f64) -> bool {
    matches!(v, Some(x) if x <= threshold)
}

fn below(v: Option<f64>, threshold: f64) -> bool {
    matches!(v, Some(x) if x < threshold)
}

fn num(v: Option<f64>) -> String {
    match v {
        Some(x) => format!("{:.1}", x),
        None => "n/a".to_string(),
    }
}

const RULES: &[Rule] = &[
    Rule {
        id: "breakdown_defense",
        signal: SignalType::Sell,
        mode: StrategyMode::Defensive,
        applies: |i| i.has(RiskFlag::BreakdownRisk) && below(i.p5, 45.0),
        card: |i| Card {
            conditions: vec![
                "Close below MA60 after a sharp 20-day decline".to_string(),
                format!("5-day up probability {}% below 45%", num(i.p5)),
            ],
            invalidation: vec![format!(
                "Close reclaims MA60 and 5-day probability rises above 50% (now {}%)",
                num(i.p5)
            )],
            plan: vec![
                "Cut exposure into strength; do not average down".to_string(),
                format!("Re-evaluate once trend score (now {}) recovers above 50", num(i.trend)),
            ],
        },
    },
    Rule {
        id: "overheated_trim",
        signal: SignalType::Hold,
        mode: StrategyMode::TakeProfit,
        applies: |i| i.has(RiskFlag::Overheated) && at_least(i.pullback_risk, 70.0),
        card: |i| Card {
            conditions: vec![
                "RSI(14) in overheated territory".to_string(),
                format!("Pullback risk {} at or above 70", num(i.pullback_risk)),
            ],
            invalidation: vec!["Pullback risk falls below 50 without a price decline".to_string()],
            plan: vec![
                "Take partial profits; no new entries at current extension".to_string(),
                format!("Trail a stop under MA20 while trend score stays at {}", num(i.trend)),
            ],
        },
    },
    Rule {
        id: "event_volatility",
        signal: SignalType::Hold,
        mode: StrategyMode::EventDriven,
        applies: |i| at_least(i.large_move, 65.0) && matches!(i.catalyst, Some(c) if c.abs() >= 40.0),
        card: |i| Card {
            conditions: vec![
                format!("Large-move probability {}% at or above 65%", num(i.large_move)),
                format!("Catalyst score {} with magnitude at least 40", num(i.catalyst)),
            ],
            invalidation: vec!["News flow fades and large-move probability drops below 50%".to_string()],
            plan: vec![
                "Size down ahead of the event; wait for the first reaction to settle".to_string(),
                format!("Follow the direction of the catalyst only if 5-day probability (now {}%) confirms", num(i.p5)),
            ],
        },
    },
    Rule {
        id: "breakout_momentum",
        signal: SignalType::Buy,
        mode: StrategyMode::Breakout,
        applies: |i| at_least(i.breakout, 70.0) && at_least(i.p5, 58.0) && at_least(i.trend, 60.0),
        card: |i| Card {
            conditions: vec![
                format!("Breakout strength {} at or above 70", num(i.breakout)),
                format!("5-day up probability {}% at or above 58%", num(i.p5)),
                format!("Trend score {} at or above 60", num(i.trend)),
            ],
            invalidation: vec![
                "Close falls back inside the prior 20-day range".to_string(),
                "Breakout day volume is not followed through within 3 sessions".to_string(),
            ],
            plan: vec![
                "Enter on the first hold above the breakout level".to_string(),
                "Stop just below the prior 20-day high".to_string(),
            ],
        },
    },
    Rule {
        id: "trend_pullback_entry",
        signal: SignalType::Buy,
        mode: StrategyMode::TrendFollowing,
        applies: |i| at_least(i.trend, 65.0) && at_most(i.pullback_risk, 35.0) && at_least(i.p20, 55.0),
        card: |i| Card {
            conditions: vec![
                format!("Trend score {} at or above 65", num(i.trend)),
                format!("Pullback risk {} at or below 35", num(i.pullback_risk)),
                format!("20-day up probability {}% at or above 55%", num(i.p20)),
            ],
            invalidation: vec!["Close below MA60 or trend score under 50".to_string()],
            plan: vec![
                "Scale in near MA20 rather than chasing".to_string(),
                format!("Hold while 20-day probability stays above 50% (now {}%)", num(i.p20)),
            ],
        },
    },
    Rule {
        id: "short_term_swing",
        signal: SignalType::Buy,
        mode: StrategyMode::ShortTermSwing,
        applies: |i| at_least(i.opportunity, 65.0) && at_least(i.p3, 58.0),
        card: |i| Card {
            conditions: vec![
                format!("Short-term opportunity {} at or above 65", num(i.opportunity)),
                format!("3-day up probability {}% at or above 58%", num(i.p3)),
            ],
            invalidation: vec!["Loses the prior session low".to_string()],
            plan: vec![
                "Small position with a 3 to 5 session holding period".to_string(),
                "Exit into the first extension above MA20".to_string(),
            ],
        },
    },
    Rule {
        id: "bearish_consensus",
        signal: SignalType::Sell,
        mode: StrategyMode::Defensive,
        applies: |i| {
            i.verdict == Some(ConsensusVerdict::Bearish) && at_least(i.consistency, 55.0) && at_most(i.p5, 42.0)
        },
        card: |i| Card {
            conditions: vec![
                format!("Signals agree on a bearish view (consistency {})", num(i.consistency)),
                format!("5-day up probability {}% at or below 42%", num(i.p5)),
            ],
            invalidation: vec!["Consensus turns unclear or 5-day probability recovers above 50%".to_string()],
            plan: vec!["Reduce exposure; wait for flows to turn before re-entering".to_string()],
        },
    },
];

const FALLBACK: Rule = Rule {
    id: "wait_for_convergence",
    signal: SignalType::Hold,
    mode: StrategyMode::Wait,
    applies: |_| true,
    card: |i| Card {
        conditions: vec![format!(
            "No setup qualifies: trend {}, opportunity {}, 5-day probability {}%",
            num(i.trend),
            num(i.opportunity),
            num(i.p5)
        )],
        invalidation: vec!["Any rule above becomes true on the next assessment".to_string()],
        plan: vec!["Stay flat and re-assess after the next session".to_string()],
    },
};

/// Ids of every rule in evaluation order
pub fn rule_ids() -> Vec<&'static str> {
    RULES.iter().chain(std::iter::once(&FALLBACK)).map(|r| r.id).collect()
}

/// Ids of every rule whose predicate holds, in evaluation order
pub fn matching_rules(inputs: &StrategyInputs) -> Vec<&'static str> {
    RULES
        .iter()
        .chain(std::iter::once(&FALLBACK))
        .filter(|r| (r.applies)(inputs))
        .map(|r| r.id)
        .collect()
}

/// 50 plus probability and opportunity deviations, less pullback risk,
/// plus a capped catalyst bonus, less a capped per-flag penalty
pub fn confidence(inputs: &StrategyInputs) -> f64 {
    let or_neutral = |v: Option<f64>| v.unwrap_or(50.0);
    let p5 = or_neutral(inputs.p5);
    let opp = or_neutral(inputs.opportunity);
    let pullback = or_neutral(inputs.pullback_risk);
    let catalyst_bonus = inputs.catalyst.map_or(0.0, |c| (c.abs() * 0.1).min(8.0));
    let flag_penalty = (5.0 * inputs.risk_flags.len() as f64).min(20.0);

    let raw = 50.0 + 0.6 * (p5 - 50.0).abs() + 0.3 * (opp - 50.0).abs() - 0.2 * (pullback - 50.0) + catalyst_bonus
        - flag_penalty;
    round1(raw.clamp(0.0, 100.0))
}

fn risk_notes(inputs: &StrategyInputs) -> Vec<String> {
    let mut notes: Vec<String> = inputs
        .risk_flags
        .iter()
        .map(|f| format!("Risk flag: {}", f.label()))
        .collect();
    if let Some(v) = inputs.volatility {
        if v >= 70.0 {
            notes.push(format!("Volatility score {:.1}: widen stops or size down", v));
        }
    }
    if let Some(lm) = inputs.large_move {
        if lm >= 50.0 {
            notes.push(format!("Large-move probability {:.1}%", lm));
        }
    }
    if notes.is_empty() {
        notes.push("No active risk flags".to_string());
    }
    notes
}

/// Run the rule table; exactly one rule fires
pub fn select(inputs: &StrategyInputs) -> StrategyDecision {
    let rule = RULES.iter().find(|r| (r.applies)(inputs)).unwrap_or(&FALLBACK);
    let card = (rule.card)(inputs);
    let confidence = confidence(inputs);
    tracing::debug!(rule = rule.id, confidence, "strategy selected");

    StrategyDecision {
        chosen_rule_id: rule.id.to_string(),
        mode: rule.mode,
        signal: rule.signal,
        strength: SignalStrength::from_confidence(confidence),
        confidence,
        action_card: ActionCard {
            title: format!("{} ({})", rule.mode.display_name(), rule.id),
            conditions: card.conditions,
            invalidation: card.invalidation,
            risk_notes: risk_notes(inputs),
            plan: card.plan,
        },
    }
}
