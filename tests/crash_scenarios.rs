//! Macro crash-risk scenarios through the public entry point

mod synthetic_market;

use factor_lens::crash::SubFactorKind;
use factor_lens::{Assessor, CrashLevel, MacroSeries, MacroSymbol};
use synthetic_market::{flat_macro, ramp_macro};

#[test]
fn test_zero_symbols_is_insufficient_data() {
    let risk = Assessor::default().crash_risk(&[]);
    assert_eq!(risk.score, None);
    assert_eq!(risk.level, CrashLevel::InsufficientData);
    assert!(risk.factors.is_empty());
    assert!(risk.triggers[0].contains("Insufficient macro data"));
}

#[test]
fn test_all_unavailable_flags_trip_gate() {
    let series: Vec<MacroSeries> = [MacroSymbol::Vix, MacroSymbol::Soxx, MacroSymbol::Dxy]
        .into_iter()
        .map(MacroSeries::unavailable)
        .collect();
    let risk = Assessor::default().crash_risk(&series);
    assert_eq!(risk.level, CrashLevel::InsufficientData);
    assert!(risk.trace.symbols_used.is_empty());
}

#[test]
fn test_non_finite_points_do_not_count() {
    let mut vix = flat_macro(MacroSymbol::Vix, 30.0, 25);
    for c in vix.closes.iter_mut().take(6) {
        *c = f64::NAN;
    }
    let risk = Assessor::default().crash_risk(&[vix, flat_macro(MacroSymbol::Qqq, 300.0, 25)]);
    assert_eq!(risk.trace.min_points, Some(19));
    assert_eq!(risk.level, CrashLevel::InsufficientData);
}

#[test]
fn test_stress_pattern_is_high() {
    let risk = Assessor::default().crash_risk(&[
        flat_macro(MacroSymbol::Vix, 36.0, 21),
        ramp_macro(MacroSymbol::Soxx, 250.0, -20.0, 21),
        ramp_macro(MacroSymbol::Dxy, 102.0, 8.0, 21),
    ]);
    let score = risk.score.expect("gate passes with three 21-point series");
    assert!(score > 40.0);
    assert_ne!(risk.level, CrashLevel::Normal);
    assert_ne!(risk.level, CrashLevel::InsufficientData);
    assert_eq!(risk.trace.symbols_used.len(), 3);
    assert_eq!(risk.trace.min_points, Some(21));
    assert!(risk.trace.availability.values().all(|available| *available));
}

#[test]
fn test_full_panic_is_extreme() {
    let risk = Assessor::default().crash_risk(&[
        ramp_macro(MacroSymbol::Vix, 20.0, 120.0, 30),
        flat_macro(MacroSymbol::Move, 170.0, 30),
        ramp_macro(MacroSymbol::Soxx, 250.0, -45.0, 30),
        ramp_macro(MacroSymbol::Qqq, 400.0, -18.0, 30),
        ramp_macro(MacroSymbol::Dxy, 100.0, 14.0, 30),
        ramp_macro(MacroSymbol::UsdJpy, 150.0, -7.0, 30),
    ]);
    assert!(risk.score.unwrap() > 99.99);
    assert_eq!(risk.level, CrashLevel::Extreme);
    assert!(risk.factors.iter().all(|f| f.is_available()));
    // two reasons per sub-factor at most, no duplicates
    let mut seen = risk.triggers.clone();
    seen.dedup();
    assert_eq!(seen.len(), risk.triggers.len());
    assert!(risk.triggers.len() <= 8);
}

#[test]
fn test_sector_only_stress_renormalizes() {
    let risk = Assessor::default().crash_risk(&[
        ramp_macro(MacroSymbol::Soxx, 250.0, -60.0, 40),
        flat_macro(MacroSymbol::Qqq, 380.0, 40),
    ]);
    let liquidity = risk
        .factors
        .iter()
        .find(|f| f.kind == SubFactorKind::LiquidityProxy)
        .unwrap();
    assert!(!liquidity.is_available());
    // only the sector sub-factor is available
    assert!((risk.score.unwrap() - 100.0).abs() < 1e-6);
    assert_eq!(risk.level, CrashLevel::Extreme);
}
