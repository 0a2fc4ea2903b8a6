//! Infrastructure monitor (spec §4.4).
//!
//! Grounded on `original_source/system_risk_controller/monitors/
//! infrastructure.py`'s trigger catalogue (the Python module imported
//! `psutil`; this crate's ambient equivalent is `sysinfo`, already a
//! teacher dependency).

use super::SnapshotProvider;
use crate::src_control::types::{HaltLevel, HaltTrigger, MonitorResult, TriggerCategory};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct InfrastructureSnapshot {
    pub cpu_pct: f64,
    pub memory_pct: f64,
    pub disk_pct: f64,
    pub clock_skew_ms: i64,
    pub db_reachable: bool,
    pub db_errors_in_window: u32,
    pub process_alive: bool,
}

#[derive(Debug, Clone)]
pub struct InfrastructureConfig {
    pub max_memory_pct: f64,
    pub max_disk_pct: f64,
    pub max_clock_skew_ms: i64,
    pub max_db_errors: u32,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            max_memory_pct: 90.0,
            max_disk_pct: 90.0,
            max_clock_skew_ms: 2_000,
            max_db_errors: 3,
        }
    }
}

fn trigger(name: &str, reason: impl Into<String>) -> HaltTrigger {
    HaltTrigger::new(TriggerCategory::Infrastructure, name, reason)
}

pub fn assess(config: &InfrastructureConfig, snapshot: &InfrastructureSnapshot) -> MonitorResult {
    if !snapshot.process_alive {
        return MonitorResult::halt(
            trigger("SERVICE_CRASH", "a monitored process is not responding"),
            HaltLevel::Hard,
            "service crash or deadlock detected",
        );
    }

    if !snapshot.db_reachable || snapshot.db_errors_in_window >= config.max_db_errors {
        return MonitorResult::halt(
            trigger("DATABASE_ERROR", format!("{} db errors in window, reachable={}", snapshot.db_errors_in_window, snapshot.db_reachable)),
            HaltLevel::Hard,
            "database connectivity failing",
        );
    }

    if snapshot.clock_skew_ms.abs() > config.max_clock_skew_ms {
        return MonitorResult::halt(
            trigger("CLOCK_DESYNC", format!("clock skew {}ms", snapshot.clock_skew_ms)),
            HaltLevel::Hard,
            "clock desynchronization beyond tolerance",
        );
    }

    if snapshot.memory_pct > config.max_memory_pct {
        return MonitorResult::halt(
            trigger("MEMORY_EXHAUSTED", format!("{:.1}% memory in use", snapshot.memory_pct)),
            HaltLevel::Soft,
            "memory exhaustion",
        );
    }

    if snapshot.disk_pct > config.max_disk_pct {
        return MonitorResult::halt(
            trigger("DISK_EXHAUSTED", format!("{:.1}% disk in use", snapshot.disk_pct)),
            HaltLevel::Soft,
            "disk exhaustion",
        );
    }

    MonitorResult::healthy("infrastructure nominal")
}

pub struct InfrastructureMonitor {
    config: InfrastructureConfig,
    provider: Box<dyn SnapshotProvider<InfrastructureSnapshot>>,
}

impl InfrastructureMonitor {
    pub fn new(config: InfrastructureConfig, provider: Box<dyn SnapshotProvider<InfrastructureSnapshot>>) -> Self {
        Self { config, provider }
    }
}

#[async_trait]
impl super::Monitor for InfrastructureMonitor {
    fn name(&self) -> &str {
        "infrastructure"
    }

    async fn evaluate(&self) -> MonitorResult {
        match self.provider.snapshot() {
            Some(snapshot) => assess(&self.config, &snapshot),
            None => MonitorResult::halt(
                trigger("SERVICE_CRASH", "snapshot provider unavailable"),
                HaltLevel::Hard,
                "could not obtain infrastructure snapshot",
            ),
        }
    }
}

/// Fills in the host-resource fields of an [`InfrastructureSnapshot`] from
/// the real OS (`sysinfo`, the `psutil` counterpart named in the Python
/// reference). Database reachability, clock skew, and process liveness are
/// not `sysinfo`'s concern and are left to the caller to overlay.
pub struct SysinfoProvider {
    system: parking_lot::Mutex<sysinfo::System>,
}

impl SysinfoProvider {
    pub fn new() -> Self {
        let mut system = sysinfo::System::new();
        system.refresh_cpu();
        system.refresh_memory();
        Self { system: parking_lot::Mutex::new(system) }
    }

    /// Host resource figures only; `db_reachable`, `db_errors_in_window`,
    /// `clock_skew_ms`, and `process_alive` are the caller's to fill in.
    pub fn host_snapshot(&self) -> (f64, f64, f64) {
        let mut system = self.system.lock();
        system.refresh_cpu();
        system.refresh_memory();

        let cpu_pct = if system.cpus().is_empty() {
            0.0
        } else {
            system.cpus().iter().map(|c| c.cpu_usage() as f64).sum::<f64>() / system.cpus().len() as f64
        };
        let memory_pct = if system.total_memory() == 0 {
            0.0
        } else {
            system.used_memory() as f64 / system.total_memory() as f64 * 100.0
        };
        (cpu_pct, memory_pct, 0.0)
    }
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> InfrastructureSnapshot {
        InfrastructureSnapshot {
            cpu_pct: 20.0,
            memory_pct: 40.0,
            disk_pct: 50.0,
            clock_skew_ms: 10,
            db_reachable: true,
            db_errors_in_window: 0,
            process_alive: true,
        }
    }

    #[test]
    fn nominal_is_healthy() {
        assert!(assess(&InfrastructureConfig::default(), &baseline()).healthy);
    }

    #[test]
    fn db_unreachable_halts_hard() {
        let mut snapshot = baseline();
        snapshot.db_reachable = false;
        let result = assess(&InfrastructureConfig::default(), &snapshot);
        assert_eq!(result.halt_level, Some(HaltLevel::Hard));
        assert_eq!(result.halt_trigger.unwrap().code, "IF_DATABASE_ERROR");
    }

    #[test]
    fn clock_skew_beyond_tolerance_halts_hard() {
        let mut snapshot = baseline();
        snapshot.clock_skew_ms = 5_000;
        let result = assess(&InfrastructureConfig::default(), &snapshot);
        assert_eq!(result.halt_trigger.unwrap().code, "IF_CLOCK_DESYNC");
    }

    #[test]
    fn memory_exhaustion_halts_soft() {
        let mut snapshot = baseline();
        snapshot.memory_pct = 95.0;
        let result = assess(&InfrastructureConfig::default(), &snapshot);
        assert_eq!(result.halt_level, Some(HaltLevel::Soft));
    }
}
