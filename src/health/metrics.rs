//! Per-source metric accumulation behind a per-source lock.
//!
//! Grounded on `original_source/data_source_health/metrics.py` and the
//! "Rolling windows: fixed-capacity ring buffers with monotonic-timestamp
//! eviction" design note. Recording is best-effort: a recording call never
//! raises to the caller, matching spec §4.6.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RequestSample {
    pub at: DateTime<Utc>,
    pub latency_ms: f64,
    pub success: bool,
    pub is_timeout: bool,
    pub error_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DataSample {
    pub at: DateTime<Utc>,
    pub data_ts: DateTime<Utc>,
    pub fields_expected: u32,
    pub fields_received: u32,
}

#[derive(Debug, Clone)]
pub struct ValueSample {
    pub at: DateTime<Utc>,
    pub field: String,
    pub value: f64,
}

/// Bounded rolling state for a single data source.
///
/// Eviction is lazy: old samples are dropped on insert, not on a timer, so
/// an idle source does not need a background sweeper.
#[derive(Debug)]
pub struct SourceMetrics {
    max_samples: usize,
    window: chrono::Duration,
    requests: VecDeque<RequestSample>,
    data: VecDeque<DataSample>,
    values: HashMap<String, VecDeque<ValueSample>>,
}

impl SourceMetrics {
    pub fn new(max_samples: usize, window_seconds: i64) -> Self {
        Self {
            max_samples,
            window: chrono::Duration::seconds(window_seconds),
            requests: VecDeque::new(),
            data: VecDeque::new(),
            values: HashMap::new(),
        }
    }

    fn evict_requests(&mut self, now: DateTime<Utc>) {
        while self.requests.len() > self.max_samples {
            self.requests.pop_front();
        }
        while let Some(front) = self.requests.front() {
            if now - front.at > self.window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    fn evict_data(&mut self, now: DateTime<Utc>) {
        while self.data.len() > self.max_samples {
            self.data.pop_front();
        }
        while let Some(front) = self.data.front() {
            if now - front.at > self.window {
                self.data.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn record_request(&mut self, now: DateTime<Utc>, sample: RequestSample) {
        self.requests.push_back(sample);
        self.evict_requests(now);
    }

    pub fn record_data(&mut self, now: DateTime<Utc>, sample: DataSample) {
        self.data.push_back(sample);
        self.evict_data(now);
    }

    pub fn record_value(&mut self, now: DateTime<Utc>, sample: ValueSample) {
        let series = self.values.entry(sample.field.clone()).or_default();
        series.push_back(sample);
        while series.len() > self.max_samples {
            series.pop_front();
        }
        while let Some(front) = series.front() {
            if now - front.at > self.window {
                series.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn requests_in_window(&self) -> &VecDeque<RequestSample> {
        &self.requests
    }

    pub fn data_in_window(&self) -> &VecDeque<DataSample> {
        &self.data
    }

    pub fn values_for(&self, field: &str) -> Option<&VecDeque<ValueSample>> {
        self.values.get(field)
    }

    pub fn latest_data_ts(&self) -> Option<DateTime<Utc>> {
        self.data.iter().map(|d| d.data_ts).max()
    }
}

/// Owns one [`SourceMetrics`] per source name, each behind its own lock to
/// avoid global contention (spec §5 locking discipline).
#[derive(Debug, Default, Clone)]
pub struct MetricsCollector {
    sources: Arc<RwLock<HashMap<String, Arc<RwLock<SourceMetrics>>>>>,
    default_max_samples: usize,
    default_window_seconds: i64,
}

impl MetricsCollector {
    pub fn new(default_max_samples: usize, default_window_seconds: i64) -> Self {
        Self {
            sources: Arc::new(RwLock::new(HashMap::new())),
            default_max_samples,
            default_window_seconds,
        }
    }

    fn source_handle(&self, source: &str) -> Arc<RwLock<SourceMetrics>> {
        if let Some(existing) = self.sources.read().get(source) {
            return existing.clone();
        }
        let mut write = self.sources.write();
        write
            .entry(source.to_string())
            .or_insert_with(|| {
                Arc::new(RwLock::new(SourceMetrics::new(
                    self.default_max_samples,
                    self.default_window_seconds,
                )))
            })
            .clone()
    }

    /// Best-effort: callers never see a recording failure.
    pub fn record_request(&self, source: &str, now: DateTime<Utc>, sample: RequestSample) {
        self.source_handle(source).write().record_request(now, sample);
    }

    pub fn record_data(&self, source: &str, now: DateTime<Utc>, sample: DataSample) {
        self.source_handle(source).write().record_data(now, sample);
    }

    pub fn record_value(&self, source: &str, now: DateTime<Utc>, sample: ValueSample) {
        self.source_handle(source).write().record_value(now, sample);
    }

    pub fn record_error(&self, source: &str, now: DateTime<Utc>, error_type: &str) {
        self.record_request(
            source,
            now,
            RequestSample {
                at: now,
                latency_ms: 0.0,
                success: false,
                is_timeout: error_type == "timeout",
                error_type: Some(error_type.to_string()),
            },
        );
    }

    pub fn snapshot(&self, source: &str) -> Option<Arc<RwLock<SourceMetrics>>> {
        self.sources.read().get(source).cloned()
    }

    pub fn known_sources(&self) -> Vec<String> {
        self.sources.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_samples_outside_window() {
        let mut m = SourceMetrics::new(1000, 60);
        let t0 = Utc::now();
        m.record_request(
            t0,
            RequestSample {
                at: t0,
                latency_ms: 10.0,
                success: true,
                is_timeout: false,
                error_type: None,
            },
        );
        assert_eq!(m.requests_in_window().len(), 1);
        let t1 = t0 + chrono::Duration::seconds(120);
        m.record_request(
            t1,
            RequestSample {
                at: t1,
                latency_ms: 10.0,
                success: true,
                is_timeout: false,
                error_type: None,
            },
        );
        assert_eq!(m.requests_in_window().len(), 1);
    }

    #[test]
    fn caps_at_max_samples_even_within_window() {
        let mut m = SourceMetrics::new(3, 3600);
        let t0 = Utc::now();
        for i in 0..10 {
            m.record_request(
                t0,
                RequestSample {
                    at: t0 + chrono::Duration::milliseconds(i),
                    latency_ms: 1.0,
                    success: true,
                    is_timeout: false,
                    error_type: None,
                },
            );
        }
        assert_eq!(m.requests_in_window().len(), 3);
    }

    #[test]
    fn recording_never_panics_across_unknown_sources() {
        let collector = MetricsCollector::new(100, 60);
        collector.record_error("ghost-source", Utc::now(), "timeout");
        assert_eq!(collector.known_sources(), vec!["ghost-source".to_string()]);
    }
}
