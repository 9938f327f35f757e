use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::error::Result;
use crate::metrics::MatchMetrics;
use crate::models::CandidateFeatureRecord;
use crate::utils::redis_timeout::run_with_timeout;

/// Location fields fetched for every candidate regardless of which
/// behavioral features the model wants.
pub const LOCATION_FEATURES: [&str; 2] = ["lat", "lon"];

/// Read-side seam over the online feature store.
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Returns one record per candidate, in input order. `feature_names`
    /// selects the behavioral features; location is always included.
    /// Absent values are `None`, never dropped, so callers can see exactly
    /// which features were unavailable per candidate.
    async fn fetch(
        &self,
        candidate_ids: &[String],
        feature_names: &[String],
    ) -> Result<Vec<CandidateFeatureRecord>>;
}

/// Feature store client over Redis. The whole candidate x feature grid is
/// resolved with a single MGET round trip per request.
pub struct RedisFeatureGateway {
    conn: ConnectionManager,
    timeout: Duration,
    metrics: Arc<MatchMetrics>,
}

impl RedisFeatureGateway {
    pub fn new(conn: ConnectionManager, timeout: Duration, metrics: Arc<MatchMetrics>) -> Self {
        Self {
            conn,
            timeout,
            metrics,
        }
    }

    fn feature_key(candidate_id: &str, feature_name: &str) -> String {
        format!("feature:{}:{}", candidate_id, feature_name)
    }
}

#[async_trait]
impl FeatureStore for RedisFeatureGateway {
    async fn fetch(
        &self,
        candidate_ids: &[String],
        feature_names: &[String],
    ) -> Result<Vec<CandidateFeatureRecord>> {
        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_names: Vec<&str> =
            Vec::with_capacity(LOCATION_FEATURES.len() + feature_names.len());
        all_names.extend(LOCATION_FEATURES);
        all_names.extend(feature_names.iter().map(String::as_str));

        let keys: Vec<String> = candidate_ids
            .iter()
            .flat_map(|id| all_names.iter().map(move |name| Self::feature_key(id, name)))
            .collect();
        debug!(
            candidates = candidate_ids.len(),
            keys = keys.len(),
            "Fetching candidate features from online store"
        );

        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = run_with_timeout(self.timeout, async move {
            redis::cmd("MGET").arg(&keys).query_async(&mut conn).await
        })
        .await?;

        Ok(assemble_records(
            &self.metrics,
            candidate_ids,
            &all_names,
            values,
        ))
    }
}

/// Folds the flat MGET reply back into per-candidate records, counting every
/// absent value against `feature_missing_total`.
fn assemble_records(
    metrics: &MatchMetrics,
    candidate_ids: &[String],
    names: &[&str],
    values: Vec<Option<String>>,
) -> Vec<CandidateFeatureRecord> {
    let per_candidate = names.len();
    candidate_ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let mut record = CandidateFeatureRecord::new(id.clone());
            for (j, &name) in names.iter().enumerate() {
                let parsed = values
                    .get(i * per_candidate + j)
                    .and_then(|v| v.as_deref())
                    .and_then(parse_feature_value);
                if parsed.is_none() {
                    metrics.feature_missing.with_label_values(&[name]).inc();
                }
                match name {
                    "lat" => record.lat = parsed,
                    "lon" => record.lon = parsed,
                    _ => {
                        record.features.insert(name.to_string(), parsed);
                    }
                }
            }
            record
        })
        .collect()
}

/// Store payloads are UTF-8 numerals. Anything unparseable or non-finite is
/// treated as absent so NaN can never leak into scoring or drift windows.
fn parse_feature_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_key_format() {
        assert_eq!(
            RedisFeatureGateway::feature_key("driver_7", "accept_rate_7d"),
            "feature:driver_7:accept_rate_7d"
        );
    }

    #[test]
    fn test_parse_feature_value() {
        assert_eq!(parse_feature_value("3.5"), Some(3.5));
        assert_eq!(parse_feature_value(" 2 "), Some(2.0));
        assert_eq!(parse_feature_value("-0.25"), Some(-0.25));
        assert_eq!(parse_feature_value("garbage"), None);
        assert_eq!(parse_feature_value(""), None);
        assert_eq!(parse_feature_value("NaN"), None);
        assert_eq!(parse_feature_value("inf"), None);
    }

    #[test]
    fn test_assemble_records_preserves_order_and_tags_missing() {
        let metrics = MatchMetrics::new().unwrap();
        let ids = vec!["driver_0".to_string(), "driver_1".to_string()];
        let names = ["lat", "lon", "accept_rate_7d"];
        // driver_0 complete; driver_1 missing lon, garbage accept rate.
        let values = vec![
            Some("40.73".to_string()),
            Some("-73.93".to_string()),
            Some("0.8".to_string()),
            Some("40.70".to_string()),
            None,
            Some("oops".to_string()),
        ];

        let records = assemble_records(&metrics, &ids, &names, values);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].candidate_id, "driver_0");
        assert_eq!(records[0].lat, Some(40.73));
        assert_eq!(records[0].lon, Some(-73.93));
        assert_eq!(records[0].feature("accept_rate_7d"), Some(0.8));
        assert!(records[0].has_location());

        assert_eq!(records[1].candidate_id, "driver_1");
        assert_eq!(records[1].lat, Some(40.70));
        assert_eq!(records[1].lon, None);
        assert!(!records[1].has_location());
        assert_eq!(records[1].feature("accept_rate_7d"), None);
        assert!(records[1].features.contains_key("accept_rate_7d"));

        assert_eq!(
            metrics.feature_missing.with_label_values(&["lon"]).get(),
            1.0
        );
        assert_eq!(
            metrics
                .feature_missing
                .with_label_values(&["accept_rate_7d"])
                .get(),
            1.0
        );
        assert_eq!(
            metrics.feature_missing.with_label_values(&["lat"]).get(),
            0.0
        );
    }

    #[test]
    fn test_assemble_records_short_reply_counts_everything_missing() {
        let metrics = MatchMetrics::new().unwrap();
        let ids = vec!["driver_0".to_string()];
        let names = ["lat", "lon"];

        let records = assemble_records(&metrics, &ids, &names, Vec::new());
        assert_eq!(records.len(), 1);
        assert!(!records[0].has_location());
        assert_eq!(
            metrics.feature_missing.with_label_values(&["lat"]).get(),
            1.0
        );
    }
}
