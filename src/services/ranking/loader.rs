use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{AppError, Result};

use super::model::{ModelArtifact, RankingModel};

/// One way of obtaining a model artifact at startup.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Human-readable source, for startup logs.
    fn describe(&self) -> String;

    async fn load(&self) -> Result<ModelArtifact>;
}

/// Fetches a registered artifact from the model registry HTTP API.
pub struct RegistryLoader {
    client: reqwest::Client,
    url: String,
}

impl RegistryLoader {
    /// Artifact pinned to a registry stage, e.g. `Production`.
    pub fn for_stage(base_url: &str, model_name: &str, stage: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!(
                "{}/models/{}/{}",
                base_url.trim_end_matches('/'),
                model_name,
                stage
            ),
        }
    }

    /// Whatever version the registry considers newest, stage ignored.
    pub fn latest(base_url: &str, model_name: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!(
                "{}/models/{}/latest",
                base_url.trim_end_matches('/'),
                model_name
            ),
        }
    }
}

#[async_trait]
impl ModelLoader for RegistryLoader {
    fn describe(&self) -> String {
        format!("model registry at {}", self.url)
    }

    async fn load(&self) -> Result<ModelArtifact> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            AppError::InitializationError(format!("Registry request failed: {}", e))
        })?;
        if !response.status().is_success() {
            return Err(AppError::InitializationError(format!(
                "Registry returned {} for {}",
                response.status(),
                self.url
            )));
        }
        response.json::<ModelArtifact>().await.map_err(|e| {
            AppError::InitializationError(format!("Malformed registry artifact: {}", e))
        })
    }
}

/// Falls back to the newest exported artifact on local disk.
pub struct LocalDirLoader {
    dir: PathBuf,
}

impl LocalDirLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn newest_artifact(&self) -> Result<PathBuf> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            AppError::InitializationError(format!(
                "Cannot read model directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
        for entry in entries {
            let entry = entry.map_err(|e| {
                AppError::InitializationError(format!("Cannot read directory entry: {}", e))
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|e| {
                    AppError::InitializationError(format!(
                        "Cannot stat {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
                newest = Some((modified, path));
            }
        }

        newest.map(|(_, path)| path).ok_or_else(|| {
            AppError::InitializationError(format!(
                "No model artifacts under {}",
                self.dir.display()
            ))
        })
    }
}

#[async_trait]
impl ModelLoader for LocalDirLoader {
    fn describe(&self) -> String {
        format!("local directory {}", self.dir.display())
    }

    async fn load(&self) -> Result<ModelArtifact> {
        let path = self.newest_artifact()?;
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            AppError::InitializationError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let artifact = serde_json::from_str(&raw).map_err(|e| {
            AppError::InitializationError(format!(
                "Malformed model artifact {}: {}",
                path.display(),
                e
            ))
        })?;
        info!(path = %path.display(), "Read model artifact from local disk");
        Ok(artifact)
    }
}

/// Tries each source in order; the first one yielding a valid model wins.
/// A source that returns an artifact failing validation counts as failed so
/// the next source still gets its chance.
pub async fn load_with_fallback(loaders: &[Box<dyn ModelLoader>]) -> Result<RankingModel> {
    for loader in loaders {
        info!(source = %loader.describe(), "Attempting model load");
        let model = match loader.load().await {
            Ok(artifact) => RankingModel::from_artifact(artifact),
            Err(e) => Err(e),
        };
        match model {
            Ok(model) => {
                info!(
                    source = %loader.describe(),
                    model = model.name(),
                    version = model.version(),
                    "Model load succeeded"
                );
                return Ok(model);
            }
            Err(e) => {
                warn!(source = %loader.describe(), error = %e, "Model load failed, trying next source");
            }
        }
    }
    Err(AppError::InitializationError(
        "All model sources failed".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticLoader {
        name: &'static str,
        artifact: Option<ModelArtifact>,
    }

    impl StaticLoader {
        fn ok(name: &'static str) -> Self {
            Self {
                name,
                artifact: Some(sample_artifact(name)),
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                name,
                artifact: None,
            }
        }
    }

    #[async_trait]
    impl ModelLoader for StaticLoader {
        fn describe(&self) -> String {
            self.name.to_string()
        }

        async fn load(&self) -> Result<ModelArtifact> {
            self.artifact
                .clone()
                .ok_or_else(|| AppError::InitializationError(format!("{} unavailable", self.name)))
        }
    }

    fn sample_artifact(name: &str) -> ModelArtifact {
        ModelArtifact {
            model_name: name.to_string(),
            version: "1".to_string(),
            features: vec!["distance_km".to_string()],
            imputer_medians: vec![4.8],
            coefficients: vec![-0.3],
            intercept: 0.0,
        }
    }

    #[tokio::test]
    async fn test_first_successful_source_wins() {
        let loaders: Vec<Box<dyn ModelLoader>> = vec![
            Box::new(StaticLoader::failing("stage")),
            Box::new(StaticLoader::ok("latest")),
            Box::new(StaticLoader::ok("local")),
        ];

        let model = load_with_fallback(&loaders).await.unwrap();
        assert_eq!(model.name(), "latest");
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_fatal() {
        let loaders: Vec<Box<dyn ModelLoader>> = vec![
            Box::new(StaticLoader::failing("stage")),
            Box::new(StaticLoader::failing("latest")),
        ];

        let result = load_with_fallback(&loaders).await;
        assert!(matches!(result, Err(AppError::InitializationError(_))));
    }

    #[tokio::test]
    async fn test_invalid_artifact_falls_through() {
        let mut broken = sample_artifact("broken");
        broken.coefficients.clear();
        let loaders: Vec<Box<dyn ModelLoader>> = vec![
            Box::new(StaticLoader {
                name: "broken",
                artifact: Some(broken),
            }),
            Box::new(StaticLoader::ok("good")),
        ];

        let model = load_with_fallback(&loaders).await.unwrap();
        assert_eq!(model.name(), "good");
    }

    #[tokio::test]
    async fn test_local_dir_picks_newest_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let older = serde_json::to_string(&sample_artifact("older")).unwrap();
        let newer = serde_json::to_string(&sample_artifact("newer")).unwrap();

        std::fs::write(dir.path().join("model_v1.json"), older).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(100));
        std::fs::write(dir.path().join("model_v2.json"), newer).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not an artifact").unwrap();

        let artifact = LocalDirLoader::new(dir.path()).load().await.unwrap();
        assert_eq!(artifact.model_name, "newer");
    }

    #[tokio::test]
    async fn test_local_dir_without_artifacts_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.pkl"), b"binary").unwrap();

        let result = LocalDirLoader::new(dir.path()).load().await;
        assert!(matches!(result, Err(AppError::InitializationError(_))));
    }

    #[test]
    fn test_registry_urls() {
        let stage = RegistryLoader::for_stage("http://localhost:5050/", "ridematch-ranker", "Production");
        assert!(stage
            .describe()
            .contains("http://localhost:5050/models/ridematch-ranker/Production"));

        let latest = RegistryLoader::latest("http://localhost:5050", "ridematch-ranker");
        assert!(latest
            .describe()
            .contains("http://localhost:5050/models/ridematch-ranker/latest"));
    }
}
