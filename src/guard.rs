//! Data-Reality Guard: the unbypassable pre-execution freshness and
//! price-deviation check (spec §4.5). Runs immediately before any order
//! emission; any failure routes to the System Risk Controller as a
//! DATA_INTEGRITY halt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
}

impl Interval {
    pub fn duration(self) -> chrono::Duration {
        match self {
            Interval::OneMinute => chrono::Duration::minutes(1),
            Interval::FiveMinutes => chrono::Duration::minutes(5),
            Interval::FifteenMinutes => chrono::Duration::minutes(15),
            Interval::OneHour => chrono::Duration::hours(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRecord {
    pub symbol: String,
    pub exchange: String,
    pub close: f64,
    pub ts: DateTime<Utc>,
    pub interval: Interval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardFailure {
    Stale,
    NoReference,
    PriceDeviation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GuardOutcome {
    Pass { deviation_pct: f64 },
    Fail { reason: GuardFailure, detail: String },
}

/// Supplies the latest stored market record for (symbol, exchange). Backed
/// in production by the ingestion cache; out of scope here (spec §1) beyond
/// this contract.
pub trait StoredRecordSource: Send + Sync {
    fn latest(&self, symbol: &str, exchange: &str) -> Option<MarketRecord>;
}

/// One independent live price reference (a second exchange, an oracle feed).
/// Returns `None` on timeout or unavailability rather than erroring — the
/// guard treats every reference as equally untrusted.
pub trait LiveReferenceSource: Send + Sync {
    fn fetch(&self, symbol: &str, timeout: Duration) -> Option<f64>;
}

pub struct DataRealityGuardConfig {
    pub max_deviation_pct: f64,
    pub reference_timeout: Duration,
    /// Paper-mode escape hatch. Disabling in live mode is logged at
    /// CRITICAL rather than silently skipping the check (spec §4.5).
    pub enabled: bool,
    pub is_live_mode: bool,
}

impl Default for DataRealityGuardConfig {
    fn default() -> Self {
        Self {
            max_deviation_pct: 3.0,
            reference_timeout: Duration::from_millis(500),
            enabled: true,
            is_live_mode: true,
        }
    }
}

pub struct DataRealityGuard {
    config: DataRealityGuardConfig,
    stored: Box<dyn StoredRecordSource>,
    references: Vec<Box<dyn LiveReferenceSource>>,
}

impl DataRealityGuard {
    pub fn new(
        config: DataRealityGuardConfig,
        stored: Box<dyn StoredRecordSource>,
        references: Vec<Box<dyn LiveReferenceSource>>,
    ) -> Self {
        if !config.enabled && config.is_live_mode {
            tracing::error!("data-reality guard disabled while running in live mode");
        }
        Self {
            config,
            stored,
            references,
        }
    }

    pub fn check(&self, symbol: &str, exchange: &str, now: DateTime<Utc>) -> GuardOutcome {
        if !self.config.enabled {
            return GuardOutcome::Pass { deviation_pct: 0.0 };
        }

        let Some(record) = self.stored.latest(symbol, exchange) else {
            return GuardOutcome::Fail {
                reason: GuardFailure::Stale,
                detail: format!("no stored record for {symbol}/{exchange}"),
            };
        };

        let max_age = record.interval.duration() * 2;
        if now - record.ts > max_age {
            return GuardOutcome::Fail {
                reason: GuardFailure::Stale,
                detail: format!("record age {} exceeds 2x interval", now - record.ts),
            };
        }

        let live_prices: Vec<f64> = self
            .references
            .iter()
            .filter_map(|r| r.fetch(symbol, self.config.reference_timeout))
            .collect();

        if live_prices.is_empty() {
            return GuardOutcome::Fail {
                reason: GuardFailure::NoReference,
                detail: "all live references unavailable".to_string(),
            };
        }

        let live_avg = live_prices.iter().sum::<f64>() / live_prices.len() as f64;
        let deviation_pct = (record.close - live_avg).abs() / live_avg * 100.0;

        if deviation_pct > self.config.max_deviation_pct {
            return GuardOutcome::Fail {
                reason: GuardFailure::PriceDeviation,
                detail: format!(
                    "deviation {deviation_pct:.2}% exceeds cap {:.2}% (stored={}, live_avg={live_avg:.2})",
                    self.config.max_deviation_pct, record.close
                ),
            };
        }

        GuardOutcome::Pass { deviation_pct }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStored(Option<MarketRecord>);
    impl StoredRecordSource for FixedStored {
        fn latest(&self, _symbol: &str, _exchange: &str) -> Option<MarketRecord> {
            self.0.clone()
        }
    }

    struct FixedReference(Option<f64>);
    impl LiveReferenceSource for FixedReference {
        fn fetch(&self, _symbol: &str, _timeout: Duration) -> Option<f64> {
            self.0
        }
    }

    fn record(ts: DateTime<Utc>, close: f64) -> MarketRecord {
        MarketRecord {
            symbol: "BTCUSDT".into(),
            exchange: "binance".into(),
            close,
            ts,
            interval: Interval::OneMinute,
        }
    }

    #[test]
    fn deviation_scenario_from_spec_fails_at_3_4_pct() {
        let now = Utc::now();
        let guard = DataRealityGuard::new(
            DataRealityGuardConfig::default(),
            Box::new(FixedStored(Some(record(now - chrono::Duration::seconds(65), 60000.0)))),
            vec![Box::new(FixedReference(Some(58000.0))), Box::new(FixedReference(Some(58050.0)))],
        );
        match guard.check("BTCUSDT", "binance", now) {
            GuardOutcome::Fail { reason, .. } => assert_eq!(reason, GuardFailure::PriceDeviation),
            other => panic!("expected FAIL(PRICE_DEVIATION), got {other:?}"),
        }
    }

    #[test]
    fn data_age_exactly_at_2x_interval_passes_not_stale() {
        let now = Utc::now();
        let guard = DataRealityGuard::new(
            DataRealityGuardConfig::default(),
            Box::new(FixedStored(Some(record(now - chrono::Duration::seconds(120), 100.0)))),
            vec![Box::new(FixedReference(Some(100.0)))],
        );
        match guard.check("BTCUSDT", "binance", now) {
            GuardOutcome::Pass { .. } => {}
            other => panic!("boundary age should pass (> not >=), got {other:?}"),
        }
    }

    #[test]
    fn all_references_unavailable_fails_no_reference() {
        let now = Utc::now();
        let guard = DataRealityGuard::new(
            DataRealityGuardConfig::default(),
            Box::new(FixedStored(Some(record(now, 100.0)))),
            vec![Box::new(FixedReference(None)), Box::new(FixedReference(None))],
        );
        match guard.check("BTCUSDT", "binance", now) {
            GuardOutcome::Fail { reason, .. } => assert_eq!(reason, GuardFailure::NoReference),
            other => panic!("expected FAIL(NO_REFERENCE), got {other:?}"),
        }
    }

    #[test]
    fn disabled_guard_passes_without_checking_anything() {
        let now = Utc::now();
        let mut config = DataRealityGuardConfig::default();
        config.enabled = false;
        let guard = DataRealityGuard::new(config, Box::new(FixedStored(None)), vec![]);
        assert!(matches!(guard.check("BTCUSDT", "binance", now), GuardOutcome::Pass { .. }));
    }
}
