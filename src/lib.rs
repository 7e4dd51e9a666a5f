//! Factor scoring, probability forecasting and strategy selection for
//! individual securities, plus a macro crash-risk composite.

pub mod backtest;
pub mod bundle;
pub mod config;
pub mod consistency;
pub mod crash;
pub mod engine;
pub mod error;
pub mod factors;
pub mod forecast;
pub mod indicators;
pub mod score;
pub mod strategy;
pub mod types;

#[cfg(test)]
mod testutil;

pub use crate::bundle::InputBundle;
pub use crate::config::AssessorConfig;
pub use crate::crash::{CrashLevel, CrashRisk};
pub use crate::engine::{Assessor, SecurityAssessment};
pub use crate::error::{AssessError, Result};
pub use crate::factors::{FactorScorer, FactorSet, ScoringContext};
pub use crate::forecast::{CalibrationBuilder, CalibrationCache, CalibrationModel, ReferenceSeries};
pub use crate::score::{CompositeScore, FactorKind, FactorScore, RiskFlag};
pub use crate::strategy::{SignalType, StrategyDecision};
pub use crate::types::{Bar, FlowRecord, Headline, MacroSeries, MacroSymbol, MarginRecord, RevenueRecord, SecurityInputs};
