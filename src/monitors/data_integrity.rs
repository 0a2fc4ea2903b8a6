//! Data Integrity monitor (spec §4.4).
//!
//! Grounded on `original_source/system_risk_controller/monitors/data_integrity.py`'s
//! trigger catalogue; the Python module's bodies were stripped from the
//! reference so the halt conditions themselves come from spec.md's monitor
//! table and this file's docstring list.

use super::SnapshotProvider;
use crate::src_control::types::{HaltLevel, HaltTrigger, MonitorResult, TriggerCategory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One ingestion feed this monitor watches (market, onchain, sentiment, ...).
#[derive(Debug, Clone)]
pub struct SourceFreshness {
    pub name: String,
    pub last_update: Option<DateTime<Utc>>,
    pub max_age_secs: i64,
    pub critical: bool,
}

#[derive(Debug, Clone)]
pub struct DataIntegritySnapshot {
    pub now: DateTime<Utc>,
    pub sources: Vec<SourceFreshness>,
    pub schema_mismatches: u32,
    pub ingestion_failures_in_window: u32,
    pub corrupted_payloads_in_window: u32,
}

#[derive(Debug, Clone)]
pub struct DataIntegrityConfig {
    pub ingestion_failure_threshold: u32,
    pub corrupted_payload_threshold: u32,
}

impl Default for DataIntegrityConfig {
    fn default() -> Self {
        Self {
            ingestion_failure_threshold: 3,
            corrupted_payload_threshold: 1,
        }
    }
}

fn trigger(name: &str, reason: impl Into<String>) -> HaltTrigger {
    HaltTrigger::new(TriggerCategory::DataIntegrity, name, reason)
}

/// Pure evaluation over a snapshot; no I/O, no shared state.
pub fn assess(config: &DataIntegrityConfig, snapshot: &DataIntegritySnapshot) -> MonitorResult {
    for source in &snapshot.sources {
        let Some(last_update) = source.last_update else {
            if source.critical {
                return MonitorResult::halt(
                    trigger("MISSING_CRITICAL_DATA", format!("{} has never reported", source.name)),
                    HaltLevel::Hard,
                    format!("missing critical source: {}", source.name),
                );
            }
            continue;
        };
        let age = (snapshot.now - last_update).num_seconds();
        if age > source.max_age_secs {
            let level = if source.critical { HaltLevel::Hard } else { HaltLevel::Soft };
            return MonitorResult::halt(
                trigger("STALE_DATA", format!("{} age {age}s exceeds {}s", source.name, source.max_age_secs)),
                level,
                format!("{} stale by {}s", source.name, age - source.max_age_secs),
            );
        }
    }

    if snapshot.schema_mismatches > 0 {
        return MonitorResult::halt(
            trigger("SCHEMA_MISMATCH", format!("{} schema mismatches observed", snapshot.schema_mismatches)),
            HaltLevel::Hard,
            "incoming payload failed schema validation",
        );
    }

    if snapshot.corrupted_payloads_in_window >= config.corrupted_payload_threshold {
        return MonitorResult::halt(
            trigger("CORRUPTED_PAYLOAD", format!("{} corrupted payloads in window", snapshot.corrupted_payloads_in_window)),
            HaltLevel::Hard,
            "corrupted payload detected",
        );
    }

    if snapshot.ingestion_failures_in_window >= config.ingestion_failure_threshold {
        return MonitorResult::halt(
            trigger(
                "INGESTION_FAILURE",
                format!("{} ingestion failures in window", snapshot.ingestion_failures_in_window),
            ),
            HaltLevel::Soft,
            "repeated ingestion failures",
        );
    }

    MonitorResult::healthy(format!("{} sources fresh", snapshot.sources.len()))
}

pub struct DataIntegrityMonitor {
    config: DataIntegrityConfig,
    provider: Box<dyn SnapshotProvider<DataIntegritySnapshot>>,
}

impl DataIntegrityMonitor {
    pub fn new(config: DataIntegrityConfig, provider: Box<dyn SnapshotProvider<DataIntegritySnapshot>>) -> Self {
        Self { config, provider }
    }
}

#[async_trait]
impl super::Monitor for DataIntegrityMonitor {
    fn name(&self) -> &str {
        "data_integrity"
    }

    async fn evaluate(&self) -> MonitorResult {
        match self.provider.snapshot() {
            Some(snapshot) => assess(&self.config, &snapshot),
            None => MonitorResult::halt(
                trigger("MISSING_CRITICAL_DATA", "snapshot provider unavailable"),
                HaltLevel::Hard,
                "could not obtain data-integrity snapshot",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_source(now: DateTime<Utc>) -> SourceFreshness {
        SourceFreshness {
            name: "market".into(),
            last_update: Some(now),
            max_age_secs: 30,
            critical: true,
        }
    }

    #[test]
    fn missing_critical_source_halts_hard() {
        let now = Utc::now();
        let snapshot = DataIntegritySnapshot {
            now,
            sources: vec![SourceFreshness {
                name: "onchain".into(),
                last_update: None,
                max_age_secs: 60,
                critical: true,
            }],
            schema_mismatches: 0,
            ingestion_failures_in_window: 0,
            corrupted_payloads_in_window: 0,
        };
        let result = assess(&DataIntegrityConfig::default(), &snapshot);
        assert!(!result.healthy);
        assert_eq!(result.halt_level, Some(HaltLevel::Hard));
        assert_eq!(result.halt_trigger.unwrap().code, "DI_MISSING_CRITICAL_DATA");
    }

    #[test]
    fn stale_non_critical_source_halts_soft() {
        let now = Utc::now();
        let mut source = fresh_source(now - chrono::Duration::seconds(90));
        source.critical = false;
        source.name = "sentiment".into();
        let snapshot = DataIntegritySnapshot {
            now,
            sources: vec![source],
            schema_mismatches: 0,
            ingestion_failures_in_window: 0,
            corrupted_payloads_in_window: 0,
        };
        let result = assess(&DataIntegrityConfig::default(), &snapshot);
        assert_eq!(result.halt_level, Some(HaltLevel::Soft));
    }

    #[test]
    fn fresh_sources_and_zero_counters_are_healthy() {
        let now = Utc::now();
        let snapshot = DataIntegritySnapshot {
            now,
            sources: vec![fresh_source(now)],
            schema_mismatches: 0,
            ingestion_failures_in_window: 0,
            corrupted_payloads_in_window: 0,
        };
        assert!(assess(&DataIntegrityConfig::default(), &snapshot).healthy);
    }

    #[test]
    fn ingestion_failure_burst_halts_soft() {
        let now = Utc::now();
        let snapshot = DataIntegritySnapshot {
            now,
            sources: vec![fresh_source(now)],
            schema_mismatches: 0,
            ingestion_failures_in_window: 5,
            corrupted_payloads_in_window: 0,
        };
        let result = assess(&DataIntegrityConfig::default(), &snapshot);
        assert_eq!(result.halt_trigger.unwrap().code, "DI_INGESTION_FAILURE");
    }
}
