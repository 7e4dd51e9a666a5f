//! Assessor configuration
//!
//! Thresholds here are empirically chosen and kept as configuration rather
//! than tuned in code. Every field has a default, so an empty file (or no
//! file at all) yields the reference settings.

use crate::error::{AssessError, Result};
use crate::factors::fundamental::MIN_FUNDAMENTAL_MONTHS;
use crate::factors::opportunity::MIN_OPPORTUNITY_BARS;
use crate::factors::trend::MIN_TREND_BARS;
use crate::factors::volatility::MIN_VOLATILITY_BARS;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment prefix for overrides, e.g. `FACTOR_LENS__THRESHOLDS__RSI_OVERHEATED=80`
pub const ENV_PREFIX: &str = "FACTOR_LENS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessorConfig {
    #[serde(default)]
    pub min_history: MinHistory,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub calibration: CalibrationSettings,
    #[serde(default)]
    pub backtest: BacktestSettings,
}

impl AssessorConfig {
    /// Load from an optional file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(AssessError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file not found: {}", path.display()),
                )));
            }
            builder = builder.add_source(::config::File::from(path));
        }
        let cfg: AssessorConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let m = &self.min_history;
        if m.trend_bars < MIN_TREND_BARS {
            return Err(AssessError::InvalidConfig(format!(
                "min_history.trend_bars must cover the 120-bar average, got {}",
                m.trend_bars
            )));
        }
        if m.volatility_bars < MIN_VOLATILITY_BARS || m.opportunity_bars < MIN_OPPORTUNITY_BARS {
            return Err(AssessError::InvalidConfig(format!(
                "volatility/opportunity history must be at least {}/{} bars",
                MIN_VOLATILITY_BARS, MIN_OPPORTUNITY_BARS
            )));
        }
        if m.flow_days == 0 || m.fundamental_months < MIN_FUNDAMENTAL_MONTHS {
            return Err(AssessError::InvalidConfig(format!(
                "flow_days must be positive and fundamental_months at least {}",
                MIN_FUNDAMENTAL_MONTHS
            )));
        }
        let t = &self.thresholds;
        if !(50.0..=100.0).contains(&t.rsi_overheated) {
            return Err(AssessError::InvalidConfig(format!(
                "thresholds.rsi_overheated out of range: {}",
                t.rsi_overheated
            )));
        }
        if t.margin_spike_pct <= 0.0 {
            return Err(AssessError::InvalidConfig(
                "thresholds.margin_spike_pct must be positive".to_string(),
            ));
        }
        let c = &self.calibration;
        if c.horizon_bars == 0 || c.stride == 0 || c.max_concurrency == 0 || c.ttl_hours <= 0 {
            return Err(AssessError::InvalidConfig(
                "calibration horizon, stride, concurrency and ttl must be positive".to_string(),
            ));
        }
        if self.backtest.window_bars == 0 {
            return Err(AssessError::InvalidConfig("backtest.window_bars must be positive".to_string()));
        }
        Ok(())
    }
}

/// Minimum-sample preconditions per scorer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinHistory {
    #[serde(default = "default_trend_bars")]
    pub trend_bars: usize,
    #[serde(default = "default_flow_days")]
    pub flow_days: usize,
    #[serde(default = "default_fundamental_months")]
    pub fundamental_months: usize,
    #[serde(default = "default_volatility_bars")]
    pub volatility_bars: usize,
    #[serde(default = "default_opportunity_bars")]
    pub opportunity_bars: usize,
}

impl Default for MinHistory {
    fn default() -> Self {
        Self {
            trend_bars: default_trend_bars(),
            flow_days: default_flow_days(),
            fundamental_months: default_fundamental_months(),
            volatility_bars: default_volatility_bars(),
            opportunity_bars: default_opportunity_bars(),
        }
    }
}

fn default_trend_bars() -> usize { 130 }
fn default_flow_days() -> usize { 30 }
fn default_fundamental_months() -> usize { 8 }
fn default_volatility_bars() -> usize { 60 }
fn default_opportunity_bars() -> usize { 30 }

/// Risk-flag thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// RSI(14) at or above which a trend is flagged overheated
    #[serde(default = "default_rsi_overheated")]
    pub rsi_overheated: f64,
    /// 5-record margin balance growth (%) flagged as a spike
    #[serde(default = "default_margin_spike_pct")]
    pub margin_spike_pct: f64,
    /// 20-bar return (%) at or below which a break under MA60 is flagged
    #[serde(default = "default_breakdown_return_pct")]
    pub breakdown_return_pct: f64,
    /// 5-day institutional net ratio at or below which selling is flagged
    #[serde(default = "default_institutional_selling_ratio")]
    pub institutional_selling_ratio: f64,
    #[serde(default = "default_high_volatility_atr_pct")]
    pub high_volatility_atr_pct: f64,
    #[serde(default = "default_volume_spike_ratio")]
    pub volume_spike_ratio: f64,
    #[serde(default = "default_gap_chase_pct")]
    pub gap_chase_pct: f64,
    #[serde(default = "default_extended_pct")]
    pub extended_pct: f64,
    /// Headlines older than this many days are ignored
    #[serde(default = "default_catalyst_window_days")]
    pub catalyst_window_days: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            rsi_overheated: default_rsi_overheated(),
            margin_spike_pct: default_margin_spike_pct(),
            breakdown_return_pct: default_breakdown_return_pct(),
            institutional_selling_ratio: default_institutional_selling_ratio(),
            high_volatility_atr_pct: default_high_volatility_atr_pct(),
            volume_spike_ratio: default_volume_spike_ratio(),
            gap_chase_pct: default_gap_chase_pct(),
            extended_pct: default_extended_pct(),
            catalyst_window_days: default_catalyst_window_days(),
        }
    }
}

fn default_rsi_overheated() -> f64 { 75.0 }
fn default_margin_spike_pct() -> f64 { 15.0 }
fn default_breakdown_return_pct() -> f64 { -8.0 }
fn default_institutional_selling_ratio() -> f64 { -0.30 }
fn default_high_volatility_atr_pct() -> f64 { 5.0 }
fn default_volume_spike_ratio() -> f64 { 2.5 }
fn default_gap_chase_pct() -> f64 { 3.0 }
fn default_extended_pct() -> f64 { 10.0 }
fn default_catalyst_window_days() -> i64 { 7 }

/// Historical replay and cache settings for probability calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSettings {
    /// Below this many pooled samples the identity model is used
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Forward outcome horizon in bars
    #[serde(default = "default_horizon_bars")]
    pub horizon_bars: usize,
    /// Replay every n-th bar
    #[serde(default = "default_stride")]
    pub stride: usize,
    /// Securities replayed concurrently by the async builder
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Cache validity window
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            horizon_bars: default_horizon_bars(),
            stride: default_stride(),
            max_concurrency: default_max_concurrency(),
            ttl_hours: default_ttl_hours(),
        }
    }
}

fn default_min_samples() -> usize { 50 }
fn default_horizon_bars() -> usize { 5 }
fn default_stride() -> usize { 1 }
fn default_max_concurrency() -> usize { 4 }
fn default_ttl_hours() -> i64 { 24 }

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestSettings {
    /// Most recent bars replayed by the evaluator
    #[serde(default = "default_window_bars")]
    pub window_bars: usize,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            window_bars: default_window_bars(),
        }
    }
}

fn default_window_bars() -> usize { 120 }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AssessorConfig::default();
        assert_eq!(cfg.min_history.trend_bars, 130);
        assert_eq!(cfg.min_history.flow_days, 30);
        assert_eq!(cfg.min_history.fundamental_months, 8);
        assert_eq!(cfg.thresholds.rsi_overheated, 75.0);
        assert_eq!(cfg.thresholds.margin_spike_pct, 15.0);
        assert_eq!(cfg.calibration.min_samples, 50);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[thresholds]\nrsi_overheated = 80.0\n\n[calibration]\nmin_samples = 200").unwrap();
        let cfg = AssessorConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.thresholds.rsi_overheated, 80.0);
        assert_eq!(cfg.thresholds.margin_spike_pct, 15.0);
        assert_eq!(cfg.calibration.min_samples, 200);
        assert_eq!(cfg.min_history.trend_bars, 130);
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = AssessorConfig::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(err, Err(AssessError::Io(_))));
    }

    #[test]
    fn test_validate_rejects_short_trend_window() {
        let mut cfg = AssessorConfig::default();
        cfg.min_history.trend_bars = 50;
        assert!(matches!(cfg.validate(), Err(AssessError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_short_fundamental_and_volatility_windows() {
        let mut cfg = AssessorConfig::default();
        cfg.min_history.fundamental_months = 3;
        assert!(matches!(cfg.validate(), Err(AssessError::InvalidConfig(_))));

        let mut cfg = AssessorConfig::default();
        cfg.min_history.volatility_bars = 5;
        assert!(matches!(cfg.validate(), Err(AssessError::InvalidConfig(_))));
    }
}
