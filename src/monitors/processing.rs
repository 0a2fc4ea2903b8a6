//! Processing pipeline monitor (spec §4.4).
//!
//! Grounded on `original_source/system_risk_controller/monitors/processing.py`'s
//! trigger catalogue (bodies stripped from the reference; thresholds below
//! are this crate's own, conservative per the controller's stated
//! philosophy of defaulting to halt on uncertainty).

use super::SnapshotProvider;
use crate::src_control::types::{HaltLevel, HaltTrigger, MonitorResult, TriggerCategory};
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ProcessingSnapshot {
    pub pipeline_errors_in_window: u32,
    pub state_flags_consistent: bool,
    pub module_versions: HashMap<String, String>,
    pub expected_version: String,
    pub last_cycle_latency_ms: f64,
    pub non_deterministic_flagged: bool,
}

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub max_pipeline_errors: u32,
    pub max_cycle_latency_ms: f64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_pipeline_errors: 5,
            max_cycle_latency_ms: 5_000.0,
        }
    }
}

fn trigger(name: &str, reason: impl Into<String>) -> HaltTrigger {
    HaltTrigger::new(TriggerCategory::Processing, name, reason)
}

pub fn assess(config: &ProcessingConfig, snapshot: &ProcessingSnapshot) -> MonitorResult {
    if snapshot.pipeline_errors_in_window > config.max_pipeline_errors {
        return MonitorResult::halt(
            trigger(
                "FEATURE_PIPELINE_ERROR",
                format!("{} pipeline errors in window", snapshot.pipeline_errors_in_window),
            ),
            HaltLevel::Hard,
            "feature pipeline error rate above threshold",
        );
    }

    if !snapshot.state_flags_consistent {
        return MonitorResult::halt(
            trigger("INCONSISTENT_STATE", "module state flags disagree"),
            HaltLevel::Hard,
            "inconsistent processing state flags",
        );
    }

    if snapshot.non_deterministic_flagged {
        return MonitorResult::halt(
            trigger("NON_DETERMINISTIC_OUTPUT", "repeated evaluation produced diverging output"),
            HaltLevel::Hard,
            "non-deterministic output detected",
        );
    }

    for (module, version) in &snapshot.module_versions {
        if version != &snapshot.expected_version {
            return MonitorResult::halt(
                trigger(
                    "VERSION_MISMATCH",
                    format!("{module} at {version}, expected {}", snapshot.expected_version),
                ),
                HaltLevel::Soft,
                "module version mismatch",
            );
        }
    }

    if snapshot.last_cycle_latency_ms > config.max_cycle_latency_ms {
        return MonitorResult::halt(
            trigger(
                "PROCESSING_TIMEOUT",
                format!("cycle latency {:.0}ms exceeds {:.0}ms", snapshot.last_cycle_latency_ms, config.max_cycle_latency_ms),
            ),
            HaltLevel::Soft,
            "processing cycle exceeded latency budget",
        );
    }

    MonitorResult::healthy("processing pipeline nominal")
}

pub struct ProcessingMonitor {
    config: ProcessingConfig,
    provider: Box<dyn SnapshotProvider<ProcessingSnapshot>>,
}

impl ProcessingMonitor {
    pub fn new(config: ProcessingConfig, provider: Box<dyn SnapshotProvider<ProcessingSnapshot>>) -> Self {
        Self { config, provider }
    }
}

#[async_trait]
impl super::Monitor for ProcessingMonitor {
    fn name(&self) -> &str {
        "processing"
    }

    async fn evaluate(&self) -> MonitorResult {
        match self.provider.snapshot() {
            Some(snapshot) => assess(&self.config, &snapshot),
            None => MonitorResult::halt(
                trigger("FEATURE_PIPELINE_ERROR", "snapshot provider unavailable"),
                HaltLevel::Hard,
                "could not obtain processing snapshot",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> ProcessingSnapshot {
        ProcessingSnapshot {
            pipeline_errors_in_window: 0,
            state_flags_consistent: true,
            module_versions: HashMap::from([("risk_scoring".to_string(), "v3".to_string())]),
            expected_version: "v3".to_string(),
            last_cycle_latency_ms: 120.0,
            non_deterministic_flagged: false,
        }
    }

    #[test]
    fn nominal_snapshot_is_healthy() {
        assert!(assess(&ProcessingConfig::default(), &baseline()).healthy);
    }

    #[test]
    fn error_burst_halts_hard() {
        let mut snapshot = baseline();
        snapshot.pipeline_errors_in_window = 10;
        let result = assess(&ProcessingConfig::default(), &snapshot);
        assert_eq!(result.halt_level, Some(HaltLevel::Hard));
    }

    #[test]
    fn version_mismatch_halts_soft() {
        let mut snapshot = baseline();
        snapshot.module_versions.insert("risk_budget".to_string(), "v2".to_string());
        let result = assess(&ProcessingConfig::default(), &snapshot);
        assert_eq!(result.halt_trigger.unwrap().code, "PR_VERSION_MISMATCH");
    }

    #[test]
    fn excessive_latency_halts_soft() {
        let mut snapshot = baseline();
        snapshot.last_cycle_latency_ms = 9_000.0;
        let result = assess(&ProcessingConfig::default(), &snapshot);
        assert_eq!(result.halt_trigger.unwrap().code, "PR_PROCESSING_TIMEOUT");
    }
}
