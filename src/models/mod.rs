use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_top_k() -> usize {
    5
}

/// Inbound ranking request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    pub requester_id: String,
    pub requester_lat: f64,
    pub requester_lon: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchCandidate {
    pub candidate_id: String,
    pub score: f64,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchResponse {
    pub matches: Vec<MatchCandidate>,
}

/// One candidate's feature vector as fetched from the online store.
///
/// Absence is carried as `None`, never a sentinel value, so missing-vs-zero
/// stays unambiguous through every layer. `features` holds a key for every
/// requested behavioral feature name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFeatureRecord {
    pub candidate_id: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub features: HashMap<String, Option<f64>>,
}

impl CandidateFeatureRecord {
    pub fn new(candidate_id: impl Into<String>) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            ..Default::default()
        }
    }

    pub fn has_location(&self) -> bool {
        self.lat.is_some() && self.lon.is_some()
    }

    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied().flatten()
    }
}
