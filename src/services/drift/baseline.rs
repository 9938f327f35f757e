use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, Result};

/// Training-time summary statistics for one feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureBaseline {
    pub mean: f64,
    pub std: f64,
    pub p50: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
}

pub type BaselineStats = HashMap<String, FeatureBaseline>;

/// Loads the baseline statistics written at training time.
///
/// A missing file is not an error: the service runs with drift monitoring
/// disabled. A file that exists but cannot be parsed is a startup failure.
pub fn load_baseline(path: &Path) -> Result<Option<BaselineStats>> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Baseline stats file not found, drift detection disabled"
        );
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::InitializationError(format!(
            "Failed to read baseline stats {}: {}",
            path.display(),
            e
        ))
    })?;
    let stats: BaselineStats = serde_json::from_str(&raw).map_err(|e| {
        AppError::InitializationError(format!(
            "Malformed baseline stats {}: {}",
            path.display(),
            e
        ))
    })?;

    info!(features = stats.len(), "Loaded drift baseline stats");
    Ok(Some(stats))
}
