pub mod baseline;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::metrics::MatchMetrics;

use self::baseline::BaselineStats;

#[derive(Debug, Clone)]
pub struct DriftConfig {
    /// Sliding window capacity per feature.
    pub window_size: usize,
    /// Observations between drift recomputations.
    pub compute_every: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            window_size: 1000,
            compute_every: 100,
        }
    }
}

struct FeatureWindow {
    values: VecDeque<f64>,
    observed_since_recompute: usize,
    baseline_p95: f64,
}

/// Compares live feature distributions against the training-time baseline.
///
/// The tracked keyset is fixed at construction from the baseline file;
/// observing any other feature name is a no-op, so arbitrary inputs cannot
/// grow memory. Each feature has its own lock: concurrent requests observing
/// different features never contend.
pub struct DriftDetector {
    windows: HashMap<String, Mutex<FeatureWindow>>,
    config: DriftConfig,
    metrics: Arc<MatchMetrics>,
}

impl DriftDetector {
    pub fn new(baseline: &BaselineStats, config: DriftConfig, metrics: Arc<MatchMetrics>) -> Self {
        let windows = baseline
            .iter()
            .map(|(name, stats)| {
                (
                    name.clone(),
                    Mutex::new(FeatureWindow {
                        values: VecDeque::with_capacity(config.window_size),
                        observed_since_recompute: 0,
                        baseline_p95: stats.p95,
                    }),
                )
            })
            .collect();
        Self {
            windows,
            config,
            metrics,
        }
    }

    /// Feeds one live observation into the feature's sliding window.
    ///
    /// Every `compute_every` observations the window p95 is compared against
    /// the baseline p95 and the drift gauge updated: absolute difference when
    /// the baseline is zero, relative otherwise. The window keeps sliding
    /// across recomputations; only the counter resets.
    pub fn observe(&self, feature_name: &str, value: f64) {
        let Some(window) = self.windows.get(feature_name) else {
            return;
        };

        let mut w = window.lock();
        if w.values.len() >= self.config.window_size {
            w.values.pop_front();
        }
        w.values.push_back(value);
        w.observed_since_recompute += 1;

        if w.observed_since_recompute >= self.config.compute_every {
            w.observed_since_recompute = 0;

            let mut sorted: Vec<f64> = w.values.iter().copied().collect();
            sorted.sort_by(f64::total_cmp);
            let current_p95 = percentile(&sorted, 95.0);

            let drift = if w.baseline_p95 == 0.0 {
                (current_p95 - w.baseline_p95).abs()
            } else {
                (current_p95 - w.baseline_p95).abs() / w.baseline_p95
            };

            self.metrics
                .feature_drift
                .with_label_values(&[feature_name])
                .set(drift);
            debug!(
                feature = feature_name,
                current_p95, baseline_p95 = w.baseline_p95, drift, "Recomputed feature drift"
            );
        }
    }

    #[cfg(test)]
    fn window_len(&self, feature_name: &str) -> usize {
        self.windows
            .get(feature_name)
            .map(|w| w.lock().values.len())
            .unwrap_or(0)
    }
}

/// Percentile with linear interpolation between order statistics, matching
/// the semantics the baseline file is produced with.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}
