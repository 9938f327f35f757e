use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::geo;
use crate::metrics::MatchMetrics;
use crate::models::{CandidateFeatureRecord, MatchCandidate, MatchRequest, MatchResponse};
use crate::services::drift::DriftDetector;
use crate::services::features::FeatureStore;
use crate::services::ranking::RankingModel;

/// Model input computed per request rather than fetched from the store.
pub const DISTANCE_FEATURE: &str = "distance_km";

/// Synthetic candidate pool: `{prefix}0 .. {prefix}{size-1}`.
///
/// Candidate discovery (a geo-indexed driver lookup) sits upstream of this
/// service; the pool stands in for its output.
#[derive(Debug, Clone)]
pub struct CandidatePool {
    ids: Vec<String>,
}

impl CandidatePool {
    pub fn new(prefix: &str, size: usize) -> Self {
        Self {
            ids: (0..size).map(|i| format!("{}{}", prefix, i)).collect(),
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

struct Located {
    record: CandidateFeatureRecord,
    lat: f64,
    lon: f64,
}

/// Sequences one ranking request end to end: feature fetch, location
/// filtering, distance computation, drift bookkeeping, scoring, ordering.
pub struct MatchingService {
    store: Arc<dyn FeatureStore>,
    model: Arc<RankingModel>,
    drift: Option<Arc<DriftDetector>>,
    pool: CandidatePool,
    metrics: Arc<MatchMetrics>,
    /// Model features resolved from the store, i.e. everything but distance.
    behavioral_features: Vec<String>,
}

impl MatchingService {
    pub fn new(
        store: Arc<dyn FeatureStore>,
        model: Arc<RankingModel>,
        drift: Option<Arc<DriftDetector>>,
        pool: CandidatePool,
        metrics: Arc<MatchMetrics>,
    ) -> Self {
        let behavioral_features = model
            .feature_names()
            .iter()
            .filter(|name| name.as_str() != DISTANCE_FEATURE)
            .cloned()
            .collect();
        Self {
            store,
            model,
            drift,
            pool,
            metrics,
            behavioral_features,
        }
    }

    pub async fn rank(&self, request: &MatchRequest) -> Result<MatchResponse> {
        validate_request(request)?;

        let records = self
            .store
            .fetch(self.pool.ids(), &self.behavioral_features)
            .await?;

        let located = self.drop_unlocated(records);
        if located.is_empty() {
            debug!(requester = %request.requester_id, "No candidates with usable locations");
            return Ok(MatchResponse::default());
        }

        let points: Vec<(f64, f64)> = located.iter().map(|l| (l.lat, l.lon)).collect();
        let distances = geo::haversine_km_batch(
            (request.requester_lat, request.requester_lon),
            &points,
        )
        .map_err(|e| AppError::Internal(format!("Distance computation failed: {}", e)))?;

        self.observe_features(&located, &distances);

        let rows: Vec<Vec<Option<f64>>> = located
            .iter()
            .zip(&distances)
            .map(|(candidate, &distance)| {
                self.model
                    .feature_names()
                    .iter()
                    .map(|name| {
                        if name.as_str() == DISTANCE_FEATURE {
                            Some(distance)
                        } else {
                            candidate.record.feature(name)
                        }
                    })
                    .collect()
            })
            .collect();

        let scores = self.model.predict_proba(&rows)?;
        for &score in &scores {
            self.metrics.prediction_scores.observe(score);
        }

        let mut scored: Vec<MatchCandidate> = located
            .iter()
            .zip(&distances)
            .zip(&scores)
            .map(|((candidate, &distance_km), &score)| MatchCandidate {
                candidate_id: candidate.record.candidate_id.clone(),
                score,
                distance_km,
            })
            .collect();

        scored.sort_by(rank_order);
        scored.truncate(request.top_k);

        debug!(
            requester = %request.requester_id,
            candidates = self.pool.len(),
            returned = scored.len(),
            "Ranked candidates"
        );
        Ok(MatchResponse { matches: scored })
    }

    /// Candidates without a resolvable, in-range location never reach
    /// scoring. One bad record must not fail the whole request.
    fn drop_unlocated(&self, records: Vec<CandidateFeatureRecord>) -> Vec<Located> {
        records
            .into_iter()
            .filter_map(|record| match (record.lat, record.lon) {
                (Some(lat), Some(lon)) => {
                    if geo::validate_coordinate(lat, lon).is_err() {
                        warn!(
                            candidate = %record.candidate_id,
                            lat, lon,
                            "Dropping candidate with out-of-range coordinates"
                        );
                        return None;
                    }
                    Some(Located { record, lat, lon })
                }
                _ => {
                    debug!(candidate = %record.candidate_id, "Dropping candidate without location");
                    None
                }
            })
            .collect()
    }

    /// Live distribution bookkeeping, gated on the drift baseline having
    /// loaded at startup. Absent behavioral values are never observed; absence
    /// is already counted by the gateway.
    fn observe_features(&self, located: &[Located], distances: &[f64]) {
        let Some(drift) = &self.drift else {
            return;
        };
        for (candidate, &distance) in located.iter().zip(distances) {
            self.metrics
                .feature_values
                .with_label_values(&[DISTANCE_FEATURE])
                .observe(distance);
            drift.observe(DISTANCE_FEATURE, distance);

            for name in &self.behavioral_features {
                if let Some(value) = candidate.record.feature(name) {
                    self.metrics
                        .feature_values
                        .with_label_values(&[name.as_str()])
                        .observe(value);
                    drift.observe(name, value);
                }
            }
        }
    }
}

/// Score descending with candidate id ascending as the tie-break. A NaN
/// score orders last, never above a real one.
fn rank_order(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    a.score
        .is_nan()
        .cmp(&b.score.is_nan())
        .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
        .then_with(|| a.candidate_id.cmp(&b.candidate_id))
}

fn validate_request(request: &MatchRequest) -> Result<()> {
    if request.requester_id.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "requester_id must not be empty".to_string(),
        ));
    }
    geo::validate_coordinate(request.requester_lat, request.requester_lon)?;
    if request.top_k == 0 {
        return Err(AppError::InvalidRequest(
            "top_k must be at least 1".to_string(),
        ));
    }
    Ok(())
}
