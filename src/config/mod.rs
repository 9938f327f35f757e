use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Service configuration, environment-driven with sensible local defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub http_port: u16,
    pub redis_url: String,
    pub feature_store_timeout_ms: u64,
    pub model_registry_url: String,
    pub model_name: String,
    pub model_stage: String,
    pub model_local_dir: String,
    pub baseline_stats_path: String,
    pub drift_window_size: usize,
    pub drift_compute_every: usize,
    pub candidate_pool_size: usize,
    pub candidate_id_prefix: String,
    /// Start the HTTP surface without Redis or a model. `/match` answers 503
    /// while `/metrics` and `/health` stay live; used by smoke tests and CI.
    pub skip_resources_init: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = config::Config::builder()
            .set_default("http_port", 8000)?
            .set_default("redis_url", "redis://localhost:6379")?
            .set_default("feature_store_timeout_ms", 2000)?
            .set_default("model_registry_url", "http://localhost:5050")?
            .set_default("model_name", "ridematch-ranker")?
            .set_default("model_stage", "Production")?
            .set_default("model_local_dir", "models/saved")?
            .set_default("baseline_stats_path", "models/feature_stats.json")?
            .set_default("drift_window_size", 1000)?
            .set_default("drift_compute_every", 100)?
            .set_default("candidate_pool_size", 100)?
            .set_default("candidate_id_prefix", "driver_")?
            .set_default("skip_resources_init", false)?
            .add_source(config::Environment::default())
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.redis_url.is_empty() {
            return Err(anyhow!("REDIS_URL must not be empty"));
        }
        if self.model_registry_url.is_empty() {
            return Err(anyhow!("MODEL_REGISTRY_URL must not be empty"));
        }
        if self.model_name.is_empty() {
            return Err(anyhow!("MODEL_NAME must not be empty"));
        }
        if self.feature_store_timeout_ms == 0 {
            return Err(anyhow!("FEATURE_STORE_TIMEOUT_MS must be positive"));
        }
        if self.drift_window_size == 0 {
            return Err(anyhow!("DRIFT_WINDOW_SIZE must be positive"));
        }
        if self.drift_compute_every == 0 {
            return Err(anyhow!("DRIFT_COMPUTE_EVERY must be positive"));
        }
        if self.drift_compute_every > self.drift_window_size {
            return Err(anyhow!(
                "DRIFT_COMPUTE_EVERY must not exceed DRIFT_WINDOW_SIZE"
            ));
        }
        if self.candidate_pool_size == 0 {
            return Err(anyhow!("CANDIDATE_POOL_SIZE must be at least 1"));
        }
        Ok(())
    }

    pub fn feature_store_timeout(&self) -> Duration {
        Duration::from_millis(self.feature_store_timeout_ms)
    }
}
