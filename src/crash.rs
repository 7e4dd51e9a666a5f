//! Systemic crash-risk composite over macro indicators
//!
//! A data-sufficiency gate runs before any sub-factor: with fewer than two
//! usable symbols, or fewer than 21 points on the shortest usable series, the
//! whole result is `InsufficientData` with no score. Past the gate, four
//! sub-factors are scored 0-100 and combined over those available.

use crate::indicators::pct_change;
use crate::score::{combine, piecewise, top_reasons, Component};
use crate::types::{MacroSeries, MacroSymbol};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIN_SYMBOLS: usize = 2;
pub const MIN_POINTS: usize = 21;
const CHANGE_POINTS: usize = 20;

const W_VOLATILITY: f64 = 0.30;
const W_SECTOR: f64 = 0.30;
const W_CROSS_ASSET: f64 = 0.20;
const W_LIQUIDITY: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashLevel {
    Normal,
    Elevated,
    High,
    Extreme,
    InsufficientData,
}

impl CrashLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            CrashLevel::Extreme
        } else if score >= 60.0 {
            CrashLevel::High
        } else if score >= 30.0 {
            CrashLevel::Elevated
        } else {
            CrashLevel::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubFactorKind {
    VolatilityStress,
    SectorBreakdown,
    CrossAssetStress,
    LiquidityProxy,
}

impl SubFactorKind {
    pub fn weight(&self) -> f64 {
        match self {
            SubFactorKind::VolatilityStress => W_VOLATILITY,
            SubFactorKind::SectorBreakdown => W_SECTOR,
            SubFactorKind::CrossAssetStress => W_CROSS_ASSET,
            SubFactorKind::LiquidityProxy => W_LIQUIDITY,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SubFactorKind::VolatilityStress => "Volatility stress",
            SubFactorKind::SectorBreakdown => "Sector breakdown",
            SubFactorKind::CrossAssetStress => "Cross-asset stress",
            SubFactorKind::LiquidityProxy => "Liquidity proxy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubFactor {
    pub kind: SubFactorKind,
    pub weight: f64,
    pub score: Option<f64>,
    pub reasons: Vec<String>,
}

impl SubFactor {
    fn unavailable(kind: SubFactorKind, reason: String) -> Self {
        Self {
            kind,
            weight: kind.weight(),
            score: None,
            reasons: vec![reason],
        }
    }

    pub fn is_available(&self) -> bool {
        self.score.is_some()
    }
}

/// Audit metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashTrace {
    pub symbols_used: Vec<MacroSymbol>,
    pub points_by_symbol: BTreeMap<MacroSymbol, usize>,
    pub min_points: Option<usize>,
    pub gate_passed: bool,
    pub availability: BTreeMap<SubFactorKind, bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashRisk {
    /// None only when the data gate trips or no sub-factor is available
    pub score: Option<f64>,
    pub level: CrashLevel,
    pub triggers: Vec<String>,
    pub factors: Vec<SubFactor>,
    pub trace: CrashTrace,
}

/// Usable closes per symbol; later duplicates replace earlier ones
struct MacroPanel {
    closes: BTreeMap<MacroSymbol, Vec<f64>>,
}

impl MacroPanel {
    fn new(series: &[MacroSeries]) -> Self {
        let mut closes = BTreeMap::new();
        for s in series.iter().filter(|s| s.available) {
            let finite = s.finite_closes();
            if finite.len() >= 2 {
                closes.insert(s.symbol, finite);
            }
        }
        Self { closes }
    }

    fn last(&self, symbol: MacroSymbol) -> Option<f64> {
        self.closes.get(&symbol).and_then(|c| c.last().copied())
    }

    /// Percent change over the last 20 points
    fn change(&self, symbol: MacroSymbol) -> Option<f64> {
        let c = self.closes.get(&symbol)?;
        if c.len() <= CHANGE_POINTS {
            return None;
        }
        pct_change(c[c.len() - 1 - CHANGE_POINTS], c[c.len() - 1])
    }
}

/// Combine components and rank their reasons by component score
fn sub_factor(kind: SubFactorKind, mut components: Vec<Component>, reasons: Vec<(String, Option<f64>)>) -> SubFactor {
    let score = combine(&mut components);
    if score.is_none() {
        return SubFactor::unavailable(kind, format!("{}: no input series available", kind.label()));
    }
    let candidates = reasons
        .into_iter()
        .filter_map(|(text, s)| s.map(|s| ((100.0 - s.clamp(0.0, 100.0)).round() as u8, text)))
        .collect();
    SubFactor {
        kind,
        weight: kind.weight(),
        score,
        reasons: top_reasons(candidates, 2),
    }
}

fn volatility_stress(panel: &MacroPanel) -> SubFactor {
    let vix = panel.last(MacroSymbol::Vix);
    let vix_change = panel.change(MacroSymbol::Vix);
    let move_level = panel.last(MacroSymbol::Move);

    let level_map = |v: f64| piecewise(v, &[(15.0, 0.0), (20.0, 25.0), (30.0, 70.0), (40.0, 100.0)]);
    let change_map = |c: f64| piecewise(c, &[(0.0, 0.0), (50.0, 100.0)]);
    let move_map = |m: f64| piecewise(m, &[(80.0, 0.0), (120.0, 60.0), (160.0, 100.0)]);

    let components = vec![
        Component::mapped("vix_level", "VIX level", vix, 0.6, level_map),
        Component::mapped("vix_change_20", "VIX 20-point change", vix_change, 0.2, change_map),
        Component::mapped("move_level", "MOVE level", move_level, 0.2, move_map),
    ];
    let mut reasons = Vec::new();
    if let Some(v) = vix {
        reasons.push((format!("VIX at {:.1}", v), Some(level_map(v))));
    }
    if let Some(c) = vix_change {
        reasons.push((format!("VIX {:+.1}% over 20 sessions", c), Some(change_map(c))));
    }
    if let Some(m) = move_level {
        reasons.push((format!("Bond volatility (MOVE) at {:.1}", m), Some(move_map(m))));
    }
    sub_factor(SubFactorKind::VolatilityStress, components, reasons)
}

fn sector_breakdown(panel: &MacroPanel) -> SubFactor {
    let map = |r: f64| piecewise(r, &[(-25.0, 100.0), (-15.0, 75.0), (-5.0, 25.0), (0.0, 0.0)]);
    let readings: Vec<(MacroSymbol, f64)> = [MacroSymbol::Soxx, MacroSymbol::Qqq]
        .into_iter()
        .filter_map(|s| panel.change(s).map(|c| (s, c)))
        .collect();
    let worst = readings
        .iter()
        .map(|(_, c)| map(*c))
        .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))));

    let components = vec![Component::new(
        "sector_drawdown_20",
        "Worst sector 20-point return",
        readings.iter().map(|(_, c)| *c).reduce(f64::min),
        worst,
        1.0,
    )];
    let reasons = readings
        .iter()
        .map(|(s, c)| (format!("{} {:+.1}% over 20 sessions", s.ticker(), c), Some(map(*c))))
        .collect();
    sub_factor(SubFactorKind::SectorBreakdown, components, reasons)
}

fn cross_asset_stress(panel: &MacroPanel) -> SubFactor {
    let dxy_map = |c: f64| piecewise(c, &[(0.0, 0.0), (2.0, 40.0), (5.0, 80.0), (8.0, 100.0)]);
    let jpy_map = |c: f64| piecewise(c, &[(-6.0, 100.0), (-3.0, 60.0), (0.0, 0.0)]);
    let dxy = panel.change(MacroSymbol::Dxy);
    let jpy = panel.change(MacroSymbol::UsdJpy);

    let scores = [dxy.map(dxy_map), jpy.map(jpy_map)];
    let worst = scores.iter().flatten().copied().reduce(f64::max);
    let components = vec![Component::new("cross_asset_20", "Dollar / yen stress", dxy.or(jpy), worst, 1.0)];

    let mut reasons = Vec::new();
    if let Some(c) = dxy {
        reasons.push((format!("Dollar index {:+.1}% over 20 sessions", c), scores[0]));
    }
    if let Some(c) = jpy {
        reasons.push((format!("USD/JPY {:+.1}% over 20 sessions (yen strength)", c), scores[1]));
    }
    sub_factor(SubFactorKind::CrossAssetStress, components, reasons)
}

/// Needs both other stresses; they must be high together to count fully
fn liquidity_proxy(volatility: &SubFactor, cross: &SubFactor) -> SubFactor {
    let (v, c) = match (volatility.score, cross.score) {
        (Some(v), Some(c)) => (v, c),
        _ => {
            return SubFactor::unavailable(
                SubFactorKind::LiquidityProxy,
                "Liquidity proxy needs both volatility and cross-asset stress".to_string(),
            )
        }
    };
    let (score, reason) = match (v >= 50.0, c >= 50.0) {
        (true, true) => (v.min(c), "Volatility and cross-asset stress elevated together".to_string()),
        (true, false) | (false, true) => (
            0.3 * v.max(c),
            "Only one of volatility or cross-asset stress is elevated".to_string(),
        ),
        (false, false) => (0.0, "No joint funding stress".to_string()),
    };
    SubFactor {
        kind: SubFactorKind::LiquidityProxy,
        weight: W_LIQUIDITY,
        score: Some(score),
        reasons: vec![reason],
    }
}

fn triggers(factors: &[SubFactor]) -> Vec<String> {
    let mut ranked: Vec<&SubFactor> = factors.iter().filter(|f| f.is_available()).collect();
    ranked.sort_by(|a, b| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)));
    let mut out: Vec<String> = Vec::new();
    for f in ranked {
        for r in f.reasons.iter().take(2) {
            if !out.contains(r) {
                out.push(r.clone());
            }
        }
    }
    out
}

/// Crash-risk composite over whatever macro series are supplied
pub fn evaluate(series: &[MacroSeries]) -> CrashRisk {
    let panel = MacroPanel::new(series);
    let points_by_symbol: BTreeMap<MacroSymbol, usize> = panel.closes.iter().map(|(s, c)| (*s, c.len())).collect();
    let symbols_used: Vec<MacroSymbol> = points_by_symbol.keys().copied().collect();
    let min_points = points_by_symbol.values().copied().min();

    if symbols_used.len() < MIN_SYMBOLS || min_points.map_or(true, |p| p < MIN_POINTS) {
        tracing::warn!(
            symbols = symbols_used.len(),
            min_points = ?min_points,
            "crash-risk gate tripped: insufficient macro data"
        );
        let message = format!(
            "Insufficient macro data: {} usable symbols (need {}), shortest series {} points (need {})",
            symbols_used.len(),
            MIN_SYMBOLS,
            min_points.unwrap_or(0),
            MIN_POINTS
        );
        return CrashRisk {
            score: None,
            level: CrashLevel::InsufficientData,
            triggers: vec![message],
            factors: Vec::new(),
            trace: CrashTrace {
                symbols_used,
                points_by_symbol,
                min_points,
                gate_passed: false,
                availability: BTreeMap::new(),
            },
        };
    }

    let volatility = volatility_stress(&panel);
    let sector = sector_breakdown(&panel);
    let cross = cross_asset_stress(&panel);
    let liquidity = liquidity_proxy(&volatility, &cross);
    let factors = vec![volatility, sector, cross, liquidity];

    let mut components: Vec<Component> = factors
        .iter()
        .map(|f| Component::new(&format!("{:?}", f.kind), f.kind.label(), f.score, f.score, f.weight))
        .collect();
    let score = combine(&mut components);
    let level = match score {
        Some(s) => CrashLevel::from_score(s),
        None => CrashLevel::InsufficientData,
    };
    let availability = factors.iter().map(|f| (f.kind, f.is_available())).collect();
    let mut triggers = triggers(&factors);
    if score.is_none() {
        triggers.push("No crash-risk sub-factor could be computed".to_string());
    }

    tracing::debug!(score = ?score, level = ?level, "crash risk evaluated");
    CrashRisk {
        score,
        level,
        triggers,
        factors,
        trace: CrashTrace {
            symbols_used,
            points_by_symbol,
            min_points,
            gate_passed: true,
            availability,
        },
    }
}
