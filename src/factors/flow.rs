//! Institutional flow factor
//!
//! Aggregates institutional (foreign, investment trust, dealer) buy/sell
//! volume per trading day and scores the net-flow ratio over 20 and 5 days
//! plus how persistently institutions were net buyers. Margin balances only
//! feed the margin-spike flag.

use super::{FactorScorer, ScoringContext};
use crate::config::Thresholds;
use crate::indicators::{pct_change, safe_ratio};
use crate::score::{saturate, Component, FactorKind, FactorScore, RiskFlag};
use crate::types::{FlowRecord, MarginRecord};
use chrono::NaiveDate;
use std::collections::BTreeSet;

const W_NET_20D: f64 = 0.45;
const W_NET_5D: f64 = 0.30;
const W_PERSISTENCE: f64 = 0.25;

/// Institutional totals for one trading day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyFlow {
    pub date: NaiveDate,
    pub net: f64,
    pub gross: f64,
}

/// Sum institutional records per date (records must be date-sorted)
pub fn daily_institutional(flows: &[FlowRecord]) -> Vec<DailyFlow> {
    let mut out: Vec<DailyFlow> = Vec::new();
    for f in flows.iter().filter(|f| f.counterparty.is_institutional()) {
        match out.last_mut() {
            Some(d) if d.date == f.date => {
                d.net += f.net();
                d.gross += f.gross();
            }
            _ => out.push(DailyFlow {
                date: f.date,
                net: f.net(),
                gross: f.gross(),
            }),
        }
    }
    out
}

/// Σnet / Σgross over the last `days` entries
pub fn net_ratio(daily: &[DailyFlow], days: usize) -> Option<f64> {
    if daily.len() < days || days == 0 {
        return None;
    }
    let window = &daily[daily.len() - days..];
    let net: f64 = window.iter().map(|d| d.net).sum();
    let gross: f64 = window.iter().map(|d| d.gross).sum();
    safe_ratio(net, gross)
}

fn margin_change_pct(margins: &[MarginRecord], records: usize) -> Option<f64> {
    if margins.len() < records + 1 {
        return None;
    }
    let latest = margins[margins.len() - 1].margin_balance;
    let base = margins[margins.len() - 1 - records].margin_balance;
    pct_change(base, latest)
}

#[derive(Debug, Clone)]
pub struct FlowScorer {
    min_days: usize,
    thresholds: Thresholds,
}

impl FlowScorer {
    pub fn new(min_days: usize, thresholds: Thresholds) -> Self {
        Self {
            min_days: min_days.max(1),
            thresholds,
        }
    }
}

impl FactorScorer for FlowScorer {
    fn kind(&self) -> FactorKind {
        FactorKind::Flow
    }

    fn min_samples(&self) -> usize {
        self.min_days
    }

    fn score(&self, ctx: &ScoringContext<'_>) -> FactorScore {
        let daily = daily_institutional(ctx.flows);
        if daily.len() < self.min_days {
            return FactorScore::insufficient(
                FactorKind::Flow,
                format!("Flow needs {} trading days, have {}", self.min_days, daily.len()),
            );
        }

        let mut candidates: Vec<(u8, String)> = Vec::new();
        let mut flags = BTreeSet::new();

        let ratio_20 = net_ratio(&daily, 20);
        let ratio_5 = net_ratio(&daily, 5);

        if let Some(r) = ratio_20 {
            if r >= 0.10 {
                candidates.push((1, format!("Institutions net buying over 20 days ({:+.1}% of volume)", r * 100.0)));
            } else if r <= -0.10 {
                candidates.push((1, format!("Institutions net selling over 20 days ({:+.1}% of volume)", r * 100.0)));
            }
        }
        if let Some(r) = ratio_5 {
            if r <= self.thresholds.institutional_selling_ratio {
                flags.insert(RiskFlag::InstitutionalSelling);
                candidates.push((0, format!("Heavy institutional selling in last 5 days ({:+.1}%)", r * 100.0)));
            } else if r >= 0.15 {
                candidates.push((2, format!("Accelerating institutional buying ({:+.1}%)", r * 100.0)));
            }
        }

        let last10 = &daily[daily.len().saturating_sub(10)..];
        let positive = last10.iter().filter(|d| d.net > 0.0).count();
        let persistence = safe_ratio(positive as f64, last10.len() as f64);
        if positive >= 8 {
            candidates.push((3, format!("Net buying on {} of last {} days", positive, last10.len())));
        } else if positive <= 2 {
            candidates.push((3, format!("Net buying on only {} of last {} days", positive, last10.len())));
        }

        if ctx.margins.is_empty() {
            candidates.push((8, "No margin balance data; margin check skipped".to_string()));
        } else if let Some(change) = margin_change_pct(ctx.margins, 5) {
            if change >= self.thresholds.margin_spike_pct {
                flags.insert(RiskFlag::MarginSpike);
                candidates.push((1, format!("Margin balance up {:.1}% in 5 sessions", change)));
            }
        }

        let components = vec![
            Component::mapped("net_ratio_20d", "20-day institutional net ratio", ratio_20, W_NET_20D, |r| {
                saturate(r, 0.15)
            }),
            Component::mapped("net_ratio_5d", "5-day institutional net ratio", ratio_5, W_NET_5D, |r| {
                saturate(r, 0.15)
            }),
            Component::mapped("persistence_10d", "Buying persistence", persistence, W_PERSISTENCE, |p| p * 100.0),
        ];

        FactorScore::from_components(FactorKind::Flow, components, candidates, flags)
    }
}
