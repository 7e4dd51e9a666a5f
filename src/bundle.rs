//! JSON input bundle read by the command-line entry point

use crate::error::Result;
use crate::forecast::ReferenceSeries;
use crate::types::{MacroSeries, SecurityInputs};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// One security, the macro series and calibration references; every part is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputBundle {
    #[serde(default)]
    pub security: Option<SecurityInputs>,
    #[serde(default, rename = "macro")]
    pub macro_series: Vec<MacroSeries>,
    #[serde(default)]
    pub reference: Vec<ReferenceSeries>,
}

impl InputBundle {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let bundle = Self::from_json(&raw)?;
        debug!(
            path = %path.display(),
            security = bundle.security.is_some(),
            macro_series = bundle.macro_series.len(),
            references = bundle.reference.len(),
            "input bundle loaded"
        );
        Ok(bundle)
    }
}
