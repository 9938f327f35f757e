use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, Result};

/// Serialized ranking pipeline exported at training time: per-feature median
/// imputation feeding a logistic regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_name: String,
    pub version: String,
    /// Model input feature names, in order.
    pub features: Vec<String>,
    /// Training-time medians, aligned with `features`.
    pub imputer_medians: Vec<f64>,
    /// Logistic regression weights, aligned with `features`.
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

/// Match-probability scorer. Immutable after load; scoring borrows it, so a
/// single instance is shared across all request tasks without locking.
pub struct RankingModel {
    artifact: ModelArtifact,
    weights: Array1<f64>,
}

impl RankingModel {
    /// Validates and wraps a loaded artifact. Inconsistent or non-finite
    /// parameters are a load failure, not something to discover per request.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        validate_artifact(&artifact)?;
        info!(
            model = %artifact.model_name,
            version = %artifact.version,
            features = artifact.features.len(),
            "Loaded ranking model"
        );
        let weights = Array1::from_vec(artifact.coefficients.clone());
        Ok(Self { artifact, weights })
    }

    pub fn name(&self) -> &str {
        &self.artifact.model_name
    }

    pub fn version(&self) -> &str {
        &self.artifact.version
    }

    /// Model input feature names, in the order rows must be laid out.
    pub fn feature_names(&self) -> &[String] {
        &self.artifact.features
    }

    /// Probability of a positive match per candidate row.
    ///
    /// Each row carries one `Option<f64>` per model feature, in
    /// [`Self::feature_names`] order. Absent values are imputed with the
    /// training-time medians; present values pass through untouched.
    pub fn predict_proba(&self, rows: &[Vec<Option<f64>>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let n_features = self.artifact.features.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(AppError::InferenceError(format!(
                    "Row {} has {} features, model expects {}",
                    i,
                    row.len(),
                    n_features
                )));
            }
        }

        let imputed = Array2::from_shape_fn((rows.len(), n_features), |(i, j)| {
            rows[i][j].unwrap_or(self.artifact.imputer_medians[j])
        });
        let logits = imputed.dot(&self.weights) + self.artifact.intercept;

        Ok(logits.iter().map(|&z| sigmoid(z)).collect())
    }
}

fn validate_artifact(artifact: &ModelArtifact) -> Result<()> {
    let n = artifact.features.len();
    if n == 0 {
        return Err(AppError::InitializationError(
            "Model artifact declares no features".to_string(),
        ));
    }
    if artifact.coefficients.len() != n || artifact.imputer_medians.len() != n {
        return Err(AppError::InitializationError(format!(
            "Model artifact is inconsistent: {} features, {} coefficients, {} medians",
            n,
            artifact.coefficients.len(),
            artifact.imputer_medians.len()
        )));
    }
    let finite = artifact.intercept.is_finite()
        && artifact.coefficients.iter().all(|c| c.is_finite())
        && artifact.imputer_medians.iter().all(|m| m.is_finite());
    if !finite {
        return Err(AppError::InitializationError(
            "Model artifact contains non-finite parameters".to_string(),
        ));
    }
    Ok(())
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
