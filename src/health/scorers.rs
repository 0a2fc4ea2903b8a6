//! Pure dimension scorers for the Data-Source Health subsystem.
//!
//! Each scorer is grounded on `original_source/data_source_health/base.py`'s
//! `BaseHealthScorer.evaluate()` fail-safe shape: on any internal error the
//! caller treats the dimension as failed (score 0, `insufficient_data`
//! false) rather than propagating a panic into the registry.

use super::metrics::SourceMetrics;
use super::types::{DimensionScore, DimensionType};
use chrono::{DateTime, Utc};

fn insufficient(dimension: DimensionType, reason: &str) -> DimensionScore {
    DimensionScore {
        dimension,
        score: 50.0,
        weighted_score: 0.0,
        explanation: reason.to_string(),
        insufficient_data: true,
    }
}

/// Fraction of recorded requests that succeeded, scaled to 0-100.
pub struct AvailabilityScorer {
    pub min_samples: usize,
}

impl AvailabilityScorer {
    pub fn score(&self, metrics: &SourceMetrics) -> DimensionScore {
        let samples = metrics.requests_in_window();
        if samples.len() < self.min_samples {
            return insufficient(DimensionType::Availability, "not enough requests recorded");
        }
        let total = samples.len() as f64;
        let ok = samples.iter().filter(|s| s.success).count() as f64;
        let score = (ok / total * 100.0).clamp(0.0, 100.0);
        DimensionScore {
            dimension: DimensionType::Availability,
            score,
            weighted_score: 0.0,
            explanation: format!("{}/{} requests succeeded", ok as u64, total as u64),
            insufficient_data: false,
        }
    }
}

/// How recently data actually arrived relative to the source's expected
/// publish interval.
pub struct FreshnessScorer {
    pub expected_interval_secs: f64,
    pub now: DateTime<Utc>,
}

impl FreshnessScorer {
    pub fn score(&self, metrics: &SourceMetrics) -> DimensionScore {
        let Some(latest) = metrics.latest_data_ts() else {
            return insufficient(DimensionType::Freshness, "no data observed yet");
        };
        let age_secs = (self.now - latest).num_milliseconds() as f64 / 1000.0;
        let ratio = (age_secs / self.expected_interval_secs).max(0.0);
        // 1x interval or less -> 100, 3x or more -> 0, linear between.
        let score = (100.0 - (ratio - 1.0).max(0.0) / 2.0 * 100.0).clamp(0.0, 100.0);
        DimensionScore {
            dimension: DimensionType::Freshness,
            score,
            weighted_score: 0.0,
            explanation: format!("last data {age_secs:.1}s old, expected every {:.1}s", self.expected_interval_secs),
            insufficient_data: false,
        }
    }
}

/// Median-absolute-deviation based outlier detection on a field's recent
/// value series: values far from the robust center count against the score.
pub struct ConsistencyScorer {
    pub field: String,
    pub min_samples: usize,
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

impl ConsistencyScorer {
    pub fn score(&self, metrics: &SourceMetrics) -> DimensionScore {
        let Some(series) = metrics.values_for(&self.field) else {
            return insufficient(DimensionType::Consistency, "field never recorded");
        };
        if series.len() < self.min_samples {
            return insufficient(DimensionType::Consistency, "not enough samples for field");
        }
        let mut values: Vec<f64> = series.iter().map(|v| v.value).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let med = median(&values);
        let mut deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
        deviations.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mad = median(&deviations);

        if mad < f64::EPSILON {
            return DimensionScore {
                dimension: DimensionType::Consistency,
                score: 100.0,
                weighted_score: 0.0,
                explanation: "series is constant, no deviation".into(),
                insufficient_data: false,
            };
        }

        let last = *values.last().unwrap();
        let z = (last - med).abs() / (1.4826 * mad);
        // z <= 1 -> 100, z >= 6 -> 0, linear between.
        let score = (100.0 - (z - 1.0).max(0.0) / 5.0 * 100.0).clamp(0.0, 100.0);
        DimensionScore {
            dimension: DimensionType::Consistency,
            score,
            weighted_score: 0.0,
            explanation: format!("latest value z-score {z:.2} against robust median"),
            insufficient_data: false,
        }
    }
}

/// Fraction of expected fields actually present across recent data samples.
pub struct CompletenessScorer {
    pub min_samples: usize,
}

impl CompletenessScorer {
    pub fn score(&self, metrics: &SourceMetrics) -> DimensionScore {
        let samples = metrics.data_in_window();
        if samples.len() < self.min_samples {
            return insufficient(DimensionType::Completeness, "not enough data samples");
        }
        let (expected, received) = samples.iter().fold((0u64, 0u64), |(e, r), s| {
            (e + s.fields_expected as u64, r + s.fields_received as u64)
        });
        if expected == 0 {
            return insufficient(DimensionType::Completeness, "no expected-field counts recorded");
        }
        let score = (received as f64 / expected as f64 * 100.0).clamp(0.0, 100.0);
        DimensionScore {
            dimension: DimensionType::Completeness,
            score,
            weighted_score: 0.0,
            explanation: format!("{received}/{expected} expected fields present"),
            insufficient_data: false,
        }
    }
}

/// Weighted penalty for errors and timeouts among recent requests, weighting
/// timeouts worse than ordinary failures.
pub struct ErrorRateScorer {
    pub min_samples: usize,
}

impl ErrorRateScorer {
    pub fn score(&self, metrics: &SourceMetrics) -> DimensionScore {
        let samples = metrics.requests_in_window();
        if samples.len() < self.min_samples {
            return insufficient(DimensionType::ErrorRate, "not enough requests recorded");
        }
        let total = samples.len() as f64;
        let weighted_errors: f64 = samples
            .iter()
            .filter(|s| !s.success)
            .map(|s| if s.is_timeout { 1.5 } else { 1.0 })
            .sum();
        let penalty = (weighted_errors / total * 100.0).min(100.0);
        let score = (100.0 - penalty).clamp(0.0, 100.0);
        DimensionScore {
            dimension: DimensionType::ErrorRate,
            score,
            weighted_score: 0.0,
            explanation: format!("{weighted_errors:.1} weighted errors over {} requests", total as u64),
            insufficient_data: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::metrics::{DataSample, RequestSample, ValueSample};

    fn metrics_with_requests(now: DateTime<Utc>, outcomes: &[bool]) -> SourceMetrics {
        let mut m = SourceMetrics::new(1000, 3600);
        for (i, ok) in outcomes.iter().enumerate() {
            m.record_request(
                now,
                RequestSample {
                    at: now - chrono::Duration::seconds(i as i64),
                    latency_ms: 5.0,
                    success: *ok,
                    is_timeout: false,
                    error_type: None,
                },
            );
        }
        m
    }

    #[test]
    fn availability_scores_full_success_as_100() {
        let now = Utc::now();
        let m = metrics_with_requests(now, &[true; 10]);
        let scorer = AvailabilityScorer { min_samples: 5 };
        let score = scorer.score(&m);
        assert_eq!(score.score, 100.0);
        assert!(!score.insufficient_data);
    }

    #[test]
    fn availability_flags_insufficient_data_below_minimum() {
        let now = Utc::now();
        let m = metrics_with_requests(now, &[true, true]);
        let scorer = AvailabilityScorer { min_samples: 5 };
        assert!(scorer.score(&m).insufficient_data);
    }

    #[test]
    fn freshness_penalizes_stale_data() {
        let now = Utc::now();
        let mut m = SourceMetrics::new(1000, 3600);
        let stale_ts = now - chrono::Duration::seconds(300);
        m.record_data(
            now,
            DataSample {
                at: now,
                data_ts: stale_ts,
                fields_expected: 10,
                fields_received: 10,
            },
        );
        let scorer = FreshnessScorer {
            expected_interval_secs: 30.0,
            now,
        };
        let score = scorer.score(&m);
        assert!(score.score < 50.0, "expected heavy penalty, got {}", score.score);
    }

    #[test]
    fn consistency_flags_outlier_against_stable_series() {
        let now = Utc::now();
        let mut m = SourceMetrics::new(1000, 3600);
        for v in [100.0, 101.0, 99.0, 100.5, 99.5, 100.2] {
            m.record_value(
                now,
                ValueSample {
                    at: now,
                    field: "price".into(),
                    value: v,
                },
            );
        }
        m.record_value(
            now,
            ValueSample {
                at: now,
                field: "price".into(),
                value: 500.0,
            },
        );
        let scorer = ConsistencyScorer {
            field: "price".into(),
            min_samples: 5,
        };
        let score = scorer.score(&m);
        assert!(score.score < 50.0, "expected outlier penalty, got {}", score.score);
    }

    #[test]
    fn error_rate_weighs_timeouts_worse_than_plain_failures() {
        let now = Utc::now();
        let mut m = SourceMetrics::new(1000, 3600);
        for i in 0..8 {
            m.record_request(
                now,
                RequestSample {
                    at: now - chrono::Duration::seconds(i),
                    latency_ms: 1.0,
                    success: true,
                    is_timeout: false,
                    error_type: None,
                },
            );
        }
        m.record_request(
            now,
            RequestSample {
                at: now,
                latency_ms: 0.0,
                success: false,
                is_timeout: true,
                error_type: Some("timeout".into()),
            },
        );
        m.record_request(
            now,
            RequestSample {
                at: now,
                latency_ms: 0.0,
                success: false,
                is_timeout: false,
                error_type: Some("rejected".into()),
            },
        );
        let scorer = ErrorRateScorer { min_samples: 5 };
        let score = scorer.score(&m);
        assert!(score.score < 100.0 && score.score > 0.0);
    }
}
