//! Aggregates per-source health scores and the weighted final score, and
//! debounces state transitions so a single noisy tick doesn't fire a
//! callback storm.
//!
//! Grounded on `original_source/data_source_health/__init__.py`'s
//! `HealthState` cutoffs and the registry's own transition-callback
//! contract described in spec §4.6.

use super::metrics::MetricsCollector;
use super::scorers::{AvailabilityScorer, CompletenessScorer, ConsistencyScorer, ErrorRateScorer, FreshnessScorer};
use super::types::{DimensionScore, DimensionType, HealthScore, HealthState, SourceHealthTransition, ALL_DIMENSIONS};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct DimensionWeights {
    pub weights: HashMap<DimensionType, f64>,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        let mut weights = HashMap::new();
        weights.insert(DimensionType::Availability, 0.30);
        weights.insert(DimensionType::Freshness, 0.25);
        weights.insert(DimensionType::Consistency, 0.20);
        weights.insert(DimensionType::Completeness, 0.15);
        weights.insert(DimensionType::ErrorRate, 0.10);
        Self { weights }
    }
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub name: String,
    pub expected_interval_secs: f64,
    pub consistency_field: String,
    pub min_samples: usize,
}

struct SourceState {
    config: SourceConfig,
    last_state: Option<HealthState>,
}

/// Holds every registered source and drives on-demand evaluation. One
/// `RwLock` guards source bookkeeping; the per-source metrics underneath
/// each carry their own lock (spec §5 "innermost lock" discipline).
pub struct HealthRegistry {
    metrics: MetricsCollector,
    weights: DimensionWeights,
    sources: RwLock<HashMap<String, SourceState>>,
    on_transition: RwLock<Vec<Box<dyn Fn(&SourceHealthTransition) + Send + Sync>>>,
    on_critical: RwLock<Vec<Box<dyn Fn(&str, &HealthScore) + Send + Sync>>>,
}

impl HealthRegistry {
    pub fn new(metrics: MetricsCollector, weights: DimensionWeights) -> Arc<Self> {
        Arc::new(Self {
            metrics,
            weights,
            sources: RwLock::new(HashMap::new()),
            on_transition: RwLock::new(Vec::new()),
            on_critical: RwLock::new(Vec::new()),
        })
    }

    pub fn register_source(&self, config: SourceConfig) {
        self.sources.write().insert(
            config.name.clone(),
            SourceState {
                config,
                last_state: None,
            },
        );
    }

    pub fn on_transition(&self, callback: impl Fn(&SourceHealthTransition) + Send + Sync + 'static) {
        self.on_transition.write().push(Box::new(callback));
    }

    /// Registers a callback fired every time a source's health resolves to
    /// [`HealthState::Critical`], including via [`Self::fail_safe_score`].
    /// Used by SRC and alerting to react immediately rather than poll.
    pub fn on_critical(&self, callback: impl Fn(&str, &HealthScore) + Send + Sync + 'static) {
        self.on_critical.write().push(Box::new(callback));
    }

    fn fire_critical(&self, score: &HealthScore) {
        if score.state == HealthState::Critical {
            for cb in self.on_critical.read().iter() {
                cb(&score.source, score);
            }
        }
    }

    /// Evaluate one source. Any internal failure (missing config, scorer
    /// panic boundary) resolves to a synthetic CRITICAL score rather than
    /// propagating — health evaluation must never crash the caller.
    pub fn evaluate(&self, source: &str, now: DateTime<Utc>) -> HealthScore {
        let config = match self.sources.read().get(source) {
            Some(s) => s.config.clone(),
            None => {
                let score = self.fail_safe_score(source, now, "source not registered");
                self.fire_critical(&score);
                return score;
            }
        };

        let Some(handle) = self.metrics.snapshot(source) else {
            let score = self.fail_safe_score(source, now, "no metrics recorded for source");
            self.fire_critical(&score);
            return score;
        };

        let started = std::time::Instant::now();
        let snapshot = handle.read();

        let availability = AvailabilityScorer {
            min_samples: config.min_samples,
        }
        .score(&snapshot);
        let freshness = FreshnessScorer {
            expected_interval_secs: config.expected_interval_secs,
            now,
        }
        .score(&snapshot);
        let consistency = ConsistencyScorer {
            field: config.consistency_field.clone(),
            min_samples: config.min_samples,
        }
        .score(&snapshot);
        let completeness = CompletenessScorer {
            min_samples: config.min_samples,
        }
        .score(&snapshot);
        let error_rate = ErrorRateScorer {
            min_samples: config.min_samples,
        }
        .score(&snapshot);
        drop(snapshot);

        let mut dims: HashMap<DimensionType, DimensionScore> = HashMap::new();
        for mut d in [availability, freshness, consistency, completeness, error_rate] {
            let weight = self.weights.weights.get(&d.dimension).copied().unwrap_or(0.0);
            d.weighted_score = d.score * weight;
            dims.insert(d.dimension, d);
        }
        debug_assert_eq!(dims.len(), ALL_DIMENSIONS.len());

        let final_score: f64 = dims.values().map(|d| d.weighted_score).sum::<f64>()
            / self.weights.weights.values().sum::<f64>().max(f64::EPSILON);
        let state = HealthState::from_score(final_score.clamp(0.0, 100.0));
        metrics::gauge!("control_plane_source_health_score", "source" => source.to_string())
            .set(final_score.clamp(0.0, 100.0));

        let previous_state = {
            let mut sources = self.sources.write();
            let entry = sources.get_mut(source);
            let prev = entry.as_ref().and_then(|s| s.last_state);
            if let Some(s) = entry {
                s.last_state = Some(state);
            }
            prev
        };

        if let Some(prev) = previous_state {
            if prev != state {
                let transition = SourceHealthTransition {
                    source: source.to_string(),
                    from: prev,
                    to: state,
                    at: now,
                };
                for cb in self.on_transition.read().iter() {
                    cb(&transition);
                }
            }
        }

        let score = HealthScore {
            source: source.to_string(),
            final_score: final_score.clamp(0.0, 100.0),
            state,
            dimension_scores: dims,
            previous_state,
            evaluation_duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            evaluated_at: now,
        };
        self.fire_critical(&score);
        score
    }

    fn fail_safe_score(&self, source: &str, now: DateTime<Utc>, reason: &str) -> HealthScore {
        let dims: HashMap<DimensionType, DimensionScore> = ALL_DIMENSIONS
            .iter()
            .map(|d| {
                (
                    *d,
                    DimensionScore {
                        dimension: *d,
                        score: 0.0,
                        weighted_score: 0.0,
                        explanation: reason.to_string(),
                        insufficient_data: true,
                    },
                )
            })
            .collect();
        HealthScore {
            source: source.to_string(),
            final_score: 0.0,
            state: HealthState::Critical,
            dimension_scores: dims,
            previous_state: None,
            evaluation_duration_ms: 0.0,
            evaluated_at: now,
        }
    }

    /// Aggregate risk multiplier across all registered sources: the
    /// minimum, since one critical source should not be masked by healthy
    /// ones (spec §4.6).
    pub fn aggregate_risk_multiplier(&self, now: DateTime<Utc>) -> f64 {
        let names: Vec<String> = self.sources.read().keys().cloned().collect();
        if names.is_empty() {
            return 1.0;
        }
        names
            .iter()
            .map(|name| self.evaluate(name, now).risk_multiplier())
            .fold(1.0, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::metrics::{MetricsCollector, RequestSample};

    #[test]
    fn unregistered_source_is_fail_safe_critical() {
        let registry = HealthRegistry::new(MetricsCollector::new(100, 60), DimensionWeights::default());
        let score = registry.evaluate("ghost", Utc::now());
        assert_eq!(score.state, HealthState::Critical);
        assert_eq!(score.risk_multiplier(), 0.0);
    }

    #[test]
    fn healthy_source_scores_full_multiplier() {
        let metrics = MetricsCollector::new(1000, 3600);
        let registry = HealthRegistry::new(metrics.clone(), DimensionWeights::default());
        registry.register_source(SourceConfig {
            name: "binance".into(),
            expected_interval_secs: 5.0,
            consistency_field: "price".into(),
            min_samples: 3,
        });
        let now = Utc::now();
        for i in 0..10 {
            metrics.record_request(
                "binance",
                now,
                RequestSample {
                    at: now - chrono::Duration::seconds(i),
                    latency_ms: 2.0,
                    success: true,
                    is_timeout: false,
                    error_type: None,
                },
            );
        }
        metrics.record_data(
            "binance",
            now,
            crate::health::metrics::DataSample {
                at: now,
                data_ts: now,
                fields_expected: 5,
                fields_received: 5,
            },
        );
        for v in [100.0, 100.1, 99.9, 100.2] {
            metrics.record_value(
                "binance",
                now,
                crate::health::metrics::ValueSample {
                    at: now,
                    field: "price".into(),
                    value: v,
                },
            );
        }
        let score = registry.evaluate("binance", now);
        assert_eq!(score.state, HealthState::Healthy);
        assert_eq!(score.risk_multiplier(), 1.0);
    }

    #[test]
    fn transition_callback_fires_only_on_state_change() {
        let metrics = MetricsCollector::new(1000, 3600);
        let registry = HealthRegistry::new(metrics.clone(), DimensionWeights::default());
        registry.register_source(SourceConfig {
            name: "news".into(),
            expected_interval_secs: 60.0,
            consistency_field: "sentiment".into(),
            min_samples: 1,
        });
        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let fired2 = fired.clone();
        registry.on_transition(move |_t| {
            fired2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let now = Utc::now();
        metrics.record_request(
            "news",
            now,
            RequestSample {
                at: now,
                latency_ms: 1.0,
                success: false,
                is_timeout: false,
                error_type: Some("err".into()),
            },
        );
        registry.evaluate("news", now);
        registry.evaluate("news", now);
        assert_eq!(fired.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
