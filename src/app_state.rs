use std::path::Path;
use std::sync::Arc;

use redis::aio::ConnectionManager;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::metrics::MatchMetrics;
use crate::services::drift::baseline::load_baseline;
use crate::services::drift::{DriftConfig, DriftDetector};
use crate::services::features::RedisFeatureGateway;
use crate::services::matching::{CandidatePool, MatchingService};
use crate::services::ranking::{load_with_fallback, LocalDirLoader, ModelLoader, RegistryLoader};

/// Shared application state, cloned into every worker.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub metrics: Arc<MatchMetrics>,
    /// `None` when started with `SKIP_RESOURCES_INIT`: the HTTP surface is
    /// live but `/match` answers 503 until real resources exist.
    pub matching: Option<Arc<MatchingService>>,
}

impl AppState {
    /// Connects the feature store, loads the model through the fallback
    /// chain, and wires the drift detector. Any failure here is fatal; the
    /// process must not serve `/match` in a broken state.
    pub async fn initialize(config: Config) -> Result<Self> {
        let metrics = Arc::new(MatchMetrics::new().map_err(|e| {
            AppError::InitializationError(format!("Metrics registration failed: {}", e))
        })?);
        let config = Arc::new(config);

        if config.skip_resources_init {
            warn!("SKIP_RESOURCES_INIT set, serving without feature store or model");
            return Ok(Self {
                config,
                metrics,
                matching: None,
            });
        }

        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| AppError::InitializationError(format!("Invalid Redis URL: {}", e)))?;
        let conn = ConnectionManager::new(client).await.map_err(|e| {
            AppError::InitializationError(format!("Feature store connection failed: {}", e))
        })?;
        info!(url = %config.redis_url, "Connected to feature store");

        let loaders: Vec<Box<dyn ModelLoader>> = vec![
            Box::new(RegistryLoader::for_stage(
                &config.model_registry_url,
                &config.model_name,
                &config.model_stage,
            )),
            Box::new(RegistryLoader::latest(
                &config.model_registry_url,
                &config.model_name,
            )),
            Box::new(LocalDirLoader::new(&config.model_local_dir)),
        ];
        let model = Arc::new(load_with_fallback(&loaders).await?);

        let baseline = load_baseline(Path::new(&config.baseline_stats_path))?;
        let drift = baseline.map(|stats| {
            Arc::new(DriftDetector::new(
                &stats,
                DriftConfig {
                    window_size: config.drift_window_size,
                    compute_every: config.drift_compute_every,
                },
                metrics.clone(),
            ))
        });
        let drift_enabled = drift.is_some();

        let gateway = RedisFeatureGateway::new(
            conn,
            config.feature_store_timeout(),
            metrics.clone(),
        );
        let pool = CandidatePool::new(&config.candidate_id_prefix, config.candidate_pool_size);
        let matching = MatchingService::new(
            Arc::new(gateway),
            model.clone(),
            drift,
            pool,
            metrics.clone(),
        );

        info!(
            model = model.name(),
            version = model.version(),
            candidates = config.candidate_pool_size,
            drift_enabled,
            "Service resources initialized"
        );

        Ok(Self {
            config,
            metrics,
            matching: Some(Arc::new(matching)),
        })
    }
}
