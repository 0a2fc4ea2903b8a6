//! Data-Source Health subsystem (spec §4.6).
//!
//! Scores each external data source on five dimensions, combines them into
//! a final 0-100 score and a [`types::HealthState`], and exposes a risk
//! multiplier the Risk Budget Manager folds into sizing decisions. Every
//! evaluation path is fail-safe: an internal error resolves to CRITICAL,
//! never a panic.

pub mod metrics;
pub mod registry;
pub mod scorers;
pub mod types;

pub use metrics::{DataSample, MetricsCollector, RequestSample, SourceMetrics, ValueSample};
pub use registry::{DimensionWeights, HealthRegistry, SourceConfig};
pub use types::{DimensionScore, DimensionType, HealthError, HealthScore, HealthState, SourceHealthTransition, SourceType, ALL_DIMENSIONS};
