//! factor-lens - assess one security and/or macro crash risk from a JSON bundle
//!
//! Usage: `factor-lens <input.json> [--config path]`
//!
//! The bundle may carry `security` (SecurityInputs), `macro` (MacroSeries[])
//! and `reference` (ReferenceSeries[] used to calibrate probabilities).
//! The assessment is printed to stdout as JSON; logs go to stderr.

use anyhow::Context;
use chrono::Utc;
use factor_lens::{Assessor, AssessorConfig, CalibrationModel, CrashRisk, InputBundle, SecurityAssessment};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Debug, Serialize)]
struct Output {
    calibration: CalibrationModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    security: Option<SecurityAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crash_risk: Option<CrashRisk>,
}

struct Args {
    input: PathBuf,
    config: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut input = None;
    let mut config = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config requires a path")?;
                config = Some(PathBuf::from(path));
            }
            other if input.is_none() => input = Some(PathBuf::from(other)),
            other => anyhow::bail!("unexpected argument: {}", other),
        }
    }
    Ok(Args {
        input: input.context("usage: factor-lens <input.json> [--config path]")?,
        config,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let config = AssessorConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    let assessor = Assessor::try_new(config).context("invalid configuration")?;

    let bundle = InputBundle::from_path(&args.input)
        .with_context(|| format!("failed to load input bundle {}", args.input.display()))?;

    let calibration = if bundle.reference.is_empty() {
        CalibrationModel::identity()
    } else {
        info!(references = bundle.reference.len(), "building calibration");
        assessor
            .calibration_builder()
            .build_concurrent(bundle.reference, Utc::now())
            .await
    };

    let security = bundle
        .security
        .as_ref()
        .map(|s| assessor.assess_with_backtest(s, &calibration));
    let crash_risk = (!bundle.macro_series.is_empty()).then(|| assessor.crash_risk(&bundle.macro_series));

    let output = Output {
        calibration,
        security,
        crash_risk,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
