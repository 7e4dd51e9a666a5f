//! Out-of-sample calibration of the 5-day probability
//!
//! Reference securities are replayed bar by bar with strictly point-in-time
//! inputs. Each replayed day yields a (raw probability, outcome) pair; an
//! ordinary least squares line through the pooled pairs is the affine
//! correction. Too few pairs, or no spread in the raw probabilities, falls
//! back to the identity model.

use super::{centered, raw_probability, Features, Horizon};
use crate::config::{AssessorConfig, CalibrationSettings};
use crate::factors::{FactorScorer, FlowScorer, OpportunityScorer, ScoringContext, TrendScorer};
use crate::score::round1;
use crate::types::{normalize_bars, normalize_flows, Bar, FlowRecord};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

const BIN_COUNT: usize = 10;

/// One decile of raw probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub mean_raw: Option<f64>,
    /// Share of up outcomes, in percent
    pub win_rate: Option<f64>,
}

/// Affine correction `slope * raw + intercept`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    pub slope: f64,
    pub intercept: f64,
    pub sample_size: usize,
    pub bins: Vec<CalibrationBin>,
    pub fitted_at: Option<DateTime<Utc>>,
}

impl CalibrationModel {
    pub fn identity() -> Self {
        Self {
            slope: 1.0,
            intercept: 0.0,
            sample_size: 0,
            bins: decile_bins(&[]),
            fitted_at: None,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.slope == 1.0 && self.intercept == 0.0
    }

    /// Calibrated probability in percent, one decimal
    pub fn apply(&self, raw: f64) -> f64 {
        let p = self.slope * raw + self.intercept;
        if !p.is_finite() {
            return raw;
        }
        round1(p.clamp(0.0, 100.0))
    }
}

impl Default for CalibrationModel {
    fn default() -> Self {
        Self::identity()
    }
}

/// Historical data of one reference security
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceSeries {
    pub symbol: String,
    pub bars: Vec<Bar>,
    #[serde(default)]
    pub flows: Vec<FlowRecord>,
}

/// One replayed day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub raw: f64,
    pub went_up: bool,
}

fn decile_bins(samples: &[CalibrationSample]) -> Vec<CalibrationBin> {
    let width = 100.0 / BIN_COUNT as f64;
    let mut sums = vec![(0usize, 0.0f64, 0usize); BIN_COUNT];
    for s in samples {
        let idx = ((s.raw / width).floor().max(0.0) as usize).min(BIN_COUNT - 1);
        let slot = &mut sums[idx];
        slot.0 += 1;
        slot.1 += s.raw;
        if s.went_up {
            slot.2 += 1;
        }
    }
    sums.into_iter()
        .enumerate()
        .map(|(i, (count, raw_sum, ups))| CalibrationBin {
            lower: i as f64 * width,
            upper: (i + 1) as f64 * width,
            count,
            mean_raw: (count > 0).then(|| raw_sum / count as f64),
            win_rate: (count > 0).then(|| ups as f64 / count as f64 * 100.0),
        })
        .collect()
}

/// Replays reference securities and fits the calibration line
#[derive(Debug, Clone)]
pub struct CalibrationBuilder {
    settings: CalibrationSettings,
    start_index: usize,
    trend: TrendScorer,
    flow: FlowScorer,
    opportunity: OpportunityScorer,
}

impl CalibrationBuilder {
    pub fn new(config: &AssessorConfig) -> Self {
        let min = config.min_history;
        let t = config.thresholds;
        let trend = TrendScorer::new(min.trend_bars, t);
        Self {
            settings: config.calibration,
            start_index: trend.min_samples(),
            trend,
            flow: FlowScorer::new(min.flow_days, t),
            opportunity: OpportunityScorer::new(min.opportunity_bars, t),
        }
    }

    pub fn settings(&self) -> &CalibrationSettings {
        &self.settings
    }

    /// Point-in-time replay of one security
    pub fn samples(&self, series: &ReferenceSeries) -> Vec<CalibrationSample> {
        let bars = normalize_bars(&series.bars);
        let flows = normalize_flows(&series.flows);
        let horizon = self.settings.horizon_bars;
        if bars.len() <= self.start_index + horizon {
            return Vec::new();
        }

        let full = ScoringContext {
            flows: &flows,
            ..ScoringContext::bars_only(&bars)
        };
        let last = bars.len() - 1 - horizon;
        (self.start_index..=last)
            .step_by(self.settings.stride.max(1))
            .map(|i| {
                let ctx = full.truncated(i);
                let features = Features {
                    trend: centered(self.trend.score(&ctx).value),
                    flow: centered(self.flow.score(&ctx).value),
                    opportunity: centered(self.opportunity.score(&ctx).value),
                    ..Features::default()
                };
                CalibrationSample {
                    raw: raw_probability(&features, Horizon::FiveDay),
                    went_up: bars[i + horizon].close > bars[i].close,
                }
            })
            .collect()
    }

    /// OLS of outcome (0 or 100) on raw probability
    pub fn fit(&self, samples: &[CalibrationSample], now: DateTime<Utc>) -> CalibrationModel {
        let bins = decile_bins(samples);
        let n = samples.len();
        let fallback = |reason: &str| {
            warn!(samples = n, reason, "calibration underfit, using identity");
            CalibrationModel {
                sample_size: n,
                bins: bins.clone(),
                fitted_at: Some(now),
                ..CalibrationModel::identity()
            }
        };
        if n < self.settings.min_samples || n == 0 {
            return fallback("too few samples");
        }

        let nf = n as f64;
        let outcome = |s: &CalibrationSample| if s.went_up { 100.0 } else { 0.0 };
        let mean_x = samples.iter().map(|s| s.raw).sum::<f64>() / nf;
        let mean_y = samples.iter().map(outcome).sum::<f64>() / nf;
        let sxx: f64 = samples.iter().map(|s| (s.raw - mean_x).powi(2)).sum();
        let sxy: f64 = samples.iter().map(|s| (s.raw - mean_x) * (outcome(s) - mean_y)).sum();
        if sxx / nf < 1e-9 {
            return fallback("no variance in raw probabilities");
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        if !slope.is_finite() || !intercept.is_finite() {
            return fallback("non-finite fit");
        }
        info!(samples = n, slope, intercept, "calibration fitted");
        CalibrationModel {
            slope,
            intercept,
            sample_size: n,
            bins,
            fitted_at: Some(now),
        }
    }

    /// Replay every reference security sequentially and fit
    pub fn build(&self, references: &[ReferenceSeries], now: DateTime<Utc>) -> CalibrationModel {
        let pooled: Vec<CalibrationSample> = references.iter().flat_map(|r| self.samples(r)).collect();
        self.fit(&pooled, now)
    }

    /// Replay reference securities on the blocking pool, at most
    /// `max_concurrency` at a time, then fit the pooled samples
    pub async fn build_concurrent(&self, references: Vec<ReferenceSeries>, now: DateTime<Utc>) -> CalibrationModel {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let builder = Arc::new(self.clone());
        let mut tasks = JoinSet::new();

        for series in references {
            let semaphore = Arc::clone(&semaphore);
            let builder = Arc::clone(&builder);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                let symbol = series.symbol.clone();
                match tokio::task::spawn_blocking(move || builder.samples(&series)).await {
                    Ok(samples) => Some(samples),
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "calibration replay failed");
                        None
                    }
                }
            });
        }

        let mut pooled = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(samples)) => pooled.extend(samples),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "calibration task aborted"),
            }
        }
        self.fit(&pooled, now)
    }
}

#[derive(Debug, Clone)]
struct CachedModel {
    model: CalibrationModel,
    built_at: DateTime<Utc>,
}

/// Resets the rebuild flag even if the build closure panics
struct RebuildGuard<'a>(&'a AtomicBool);

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Shared calibration model with a validity window
#[derive(Debug)]
pub struct CalibrationCache {
    ttl: Duration,
    slot: RwLock<Option<CachedModel>>,
    rebuilding: AtomicBool,
}

impl CalibrationCache {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            ttl: Duration::hours(ttl_hours),
            slot: RwLock::new(None),
            rebuilding: AtomicBool::new(false),
        }
    }

    fn latest(&self) -> Option<CachedModel> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Cached model if still valid at `now`
    pub fn fresh(&self, now: DateTime<Utc>) -> Option<CalibrationModel> {
        self.latest()
            .filter(|c| now - c.built_at < self.ttl)
            .map(|c| c.model)
    }

    pub fn store(&self, model: CalibrationModel, built_at: DateTime<Utc>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(CachedModel { model, built_at });
    }

    /// Valid cached model, or rebuild with `build` on expiry.
    /// While another caller is rebuilding, the previous model (or identity) is returned.
    pub fn get_or_rebuild<F>(&self, now: DateTime<Utc>, build: F) -> CalibrationModel
    where
        F: FnOnce() -> CalibrationModel,
    {
        if let Some(model) = self.fresh(now) {
            return model;
        }
        if self
            .rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return self.latest().map(|c| c.model).unwrap_or_else(CalibrationModel::identity);
        }
        let _guard = RebuildGuard(&self.rebuilding);
        // a rebuild may have finished between the first check and the exchange
        if let Some(model) = self.fresh(now) {
            return model;
        }

        info!("calibration cache expired, rebuilding");
        let model = build();
        self.store(model.clone(), now);
        model
    }
}
