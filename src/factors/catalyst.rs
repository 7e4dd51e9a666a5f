//! News catalyst score in [-100, 100] from recent headlines
//!
//! Keyword lexicon with a per-day recency decay. Headlines outside the
//! window are ignored; no recent headline makes the score unavailable.

use super::ScoringContext;
use serde::{Deserialize, Serialize};

const DECAY_PER_DAY: f64 = 0.85;
const POINTS_PER_HIT: f64 = 25.0;

const POSITIVE: &[(&str, f64)] = &[
    ("beats", 1.0),
    ("record", 0.8),
    ("upgrade", 1.0),
    ("raises guidance", 1.2),
    ("buyback", 0.8),
    ("contract", 0.6),
    ("approval", 1.0),
    ("partnership", 0.6),
    ("surge", 0.7),
    ("dividend", 0.5),
];

const NEGATIVE: &[(&str, f64)] = &[
    ("misses", 1.0),
    ("downgrade", 1.0),
    ("cuts guidance", 1.2),
    ("investigation", 1.0),
    ("lawsuit", 0.8),
    ("recall", 0.8),
    ("plunge", 0.7),
    ("fraud", 1.5),
    ("default", 1.2),
    ("layoffs", 0.6),
];

/// Catalyst reading for one security
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalystScore {
    pub value: Option<f64>,
    pub headline_count: usize,
    pub reasons: Vec<String>,
}

impl CatalystScore {
    pub fn is_available(&self) -> bool {
        self.value.is_some()
    }
}

fn lexicon_weight(title: &str) -> (f64, Vec<&'static str>) {
    let lower = title.to_lowercase();
    let mut weight = 0.0;
    let mut hits = Vec::new();
    for (word, w) in POSITIVE {
        if lower.contains(word) {
            weight += w;
            hits.push(*word);
        }
    }
    for (word, w) in NEGATIVE {
        if lower.contains(word) {
            weight -= w;
            hits.push(*word);
        }
    }
    (weight, hits)
}

#[derive(Debug, Clone)]
pub struct CatalystScorer {
    window_days: i64,
}

impl CatalystScorer {
    pub fn new(window_days: i64) -> Self {
        Self { window_days }
    }

    pub fn score(&self, ctx: &ScoringContext<'_>) -> CatalystScore {
        let as_of = match ctx.as_of {
            Some(d) => d,
            None => {
                return CatalystScore {
                    value: None,
                    headline_count: 0,
                    reasons: vec!["No reference date for headlines".to_string()],
                }
            }
        };

        let recent: Vec<_> = ctx
            .headlines
            .iter()
            .filter(|h| {
                let age = (as_of - h.date).num_days();
                (0..=self.window_days).contains(&age)
            })
            .collect();
        if recent.is_empty() {
            return CatalystScore {
                value: None,
                headline_count: 0,
                reasons: vec![format!("No headlines in the last {} days", self.window_days)],
            };
        }

        let mut total = 0.0;
        let mut scored: Vec<(f64, String)> = Vec::new();
        for h in &recent {
            let (weight, hits) = lexicon_weight(&h.title);
            if hits.is_empty() {
                continue;
            }
            let age = (as_of - h.date).num_days() as f64;
            let decayed = weight * DECAY_PER_DAY.powf(age);
            total += decayed;
            scored.push((decayed, format!("{} [{}]", h.title, hits.join(", "))));
        }
        scored.sort_by(|a, b| b.0.abs().total_cmp(&a.0.abs()));

        let value = (POINTS_PER_HIT * total).clamp(-100.0, 100.0);
        let mut reasons: Vec<String> = scored.into_iter().take(3).map(|(_, r)| r).collect();
        if reasons.is_empty() {
            reasons.push(format!("{} recent headlines, none market-moving", recent.len()));
        }
        CatalystScore {
            value: Some(value),
            headline_count: recent.len(),
            reasons,
        }
    }
}
