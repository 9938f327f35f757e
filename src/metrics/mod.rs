use prometheus::{
    CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use tracing::error;

/// All metrics exposed by the service, registered on an owned registry.
///
/// The registry is explicit rather than the process-global default so tests
/// can assert on counters without cross-talk.
pub struct MatchMetrics {
    registry: Registry,
    pub request_latency: Histogram,
    pub errors: CounterVec,
    pub prediction_scores: Histogram,
    pub feature_missing: CounterVec,
    pub feature_values: HistogramVec,
    pub feature_drift: GaugeVec,
}

impl MatchMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let request_latency = Histogram::with_opts(
            HistogramOpts::new(
                "match_request_latency_seconds",
                "End-to-end latency of match requests",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0]),
        )?;
        registry.register(Box::new(request_latency.clone()))?;

        let errors = CounterVec::new(
            Opts::new("match_errors_total", "Match request errors by error type"),
            &["error_type"],
        )?;
        registry.register(Box::new(errors.clone()))?;

        let prediction_scores = Histogram::with_opts(
            HistogramOpts::new("prediction_scores", "Model match probabilities")
                .buckets(vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]),
        )?;
        registry.register(Box::new(prediction_scores.clone()))?;

        let feature_missing = CounterVec::new(
            Opts::new(
                "feature_missing_total",
                "Feature values absent from the online store",
            ),
            &["feature_name"],
        )?;
        registry.register(Box::new(feature_missing.clone()))?;

        let feature_values = HistogramVec::new(
            HistogramOpts::new("feature_values", "Observed feature values")
                .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0]),
            &["feature_name"],
        )?;
        registry.register(Box::new(feature_values.clone()))?;

        let feature_drift = GaugeVec::new(
            Opts::new(
                "feature_drift_score",
                "p95 drift of live feature distributions against the training baseline",
            ),
            &["feature_name"],
        )?;
        registry.register(Box::new(feature_drift.clone()))?;

        Ok(Self {
            registry,
            request_latency,
            errors,
            prediction_scores,
            feature_missing,
            feature_values,
            feature_drift,
        })
    }

    pub fn record_error(&self, kind: &str) {
        self.errors.with_label_values(&[kind]).inc();
    }

    /// Prometheus text exposition of everything on this registry.
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_render_after_first_touch() {
        let metrics = MatchMetrics::new().unwrap();
        metrics.record_error("inference_error");
        metrics.prediction_scores.observe(0.83);
        metrics.feature_missing.with_label_values(&["lat"]).inc();
        metrics
            .feature_values
            .with_label_values(&["distance_km"])
            .observe(3.2);
        metrics
            .feature_drift
            .with_label_values(&["distance_km"])
            .set(0.07);

        let body = metrics.gather();
        for name in [
            "match_request_latency_seconds",
            "match_errors_total",
            "prediction_scores",
            "feature_missing_total",
            "feature_values",
            "feature_drift_score",
        ] {
            assert!(body.contains(name), "missing {name} in:\n{body}");
        }
    }

    #[test]
    fn test_registries_are_isolated() {
        let a = MatchMetrics::new().unwrap();
        let b = MatchMetrics::new().unwrap();
        a.record_error("invalid_request");
        assert!(a
            .gather()
            .contains(r#"match_errors_total{error_type="invalid_request"} 1"#));
        assert!(!b.gather().contains(r#"match_errors_total{error_type"#));
    }

    #[test]
    fn test_error_counter_increments_by_kind() {
        let metrics = MatchMetrics::new().unwrap();
        metrics.record_error("feature_store_error");
        metrics.record_error("feature_store_error");
        assert_eq!(
            metrics
                .errors
                .with_label_values(&["feature_store_error"])
                .get(),
            2.0
        );
    }
}
