//! Data contracts for the System Risk Controller (spec §4.4).
//!
//! Grounded on `original_source/system_risk_controller/__init__.py`'s
//! public enum/dataclass surface and usage example.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemState {
    Running,
    Degraded,
    HaltedSoft,
    HaltedHard,
    EmergencyLockdown,
}

impl SystemState {
    /// `HALTED_HARD` and above require an explicit manual resume.
    pub fn requires_manual_resume(self) -> bool {
        self >= SystemState::HaltedHard
    }

    pub fn can_trade(self) -> bool {
        matches!(self, SystemState::Running | SystemState::Degraded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HaltLevel {
    Soft,
    Hard,
    Emergency,
}

impl HaltLevel {
    /// Target state a fresh halt at this level drives the machine toward,
    /// before severity-monotone clamping against the current state.
    pub fn target_state(self) -> SystemState {
        match self {
            HaltLevel::Soft => SystemState::HaltedSoft,
            HaltLevel::Hard => SystemState::HaltedHard,
            HaltLevel::Emergency => SystemState::EmergencyLockdown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerCategory {
    DataIntegrity,
    Processing,
    Execution,
    Control,
    Infrastructure,
    Manual,
    Internal,
}

impl TriggerCategory {
    /// Short code prefix used in trigger identifiers (`DI_`, `PR_`, ...),
    /// matching the original's naming convention.
    pub fn prefix(self) -> &'static str {
        match self {
            TriggerCategory::DataIntegrity => "DI",
            TriggerCategory::Processing => "PR",
            TriggerCategory::Execution => "EX",
            TriggerCategory::Control => "CT",
            TriggerCategory::Infrastructure => "IF",
            TriggerCategory::Manual => "MN",
            TriggerCategory::Internal => "IN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaltTrigger {
    pub category: TriggerCategory,
    /// e.g. `DI_STALE_DATA`, `EX_POSITION_MISMATCH`.
    pub code: String,
    pub reason: String,
}

impl HaltTrigger {
    pub fn new(category: TriggerCategory, name: &str, reason: impl Into<String>) -> Self {
        Self {
            category,
            code: format!("{}_{}", category.prefix(), name),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaltEvent {
    pub id: Uuid,
    pub trigger: HaltTrigger,
    pub level: HaltLevel,
    pub reason: String,
    pub category: TriggerCategory,
    pub timestamp: DateTime<Utc>,
    pub monitor_id: Option<String>,
    pub snapshot: String,
    pub correlation_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub id: i64,
    pub from: SystemState,
    pub to: SystemState,
    pub trigger: Option<HaltTrigger>,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ResumeRequest {
    pub operator: String,
    pub reason: String,
    pub acknowledged: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("illegal transition from {from:?} to {to:?}")]
pub struct InvalidStateTransitionError {
    pub from: SystemState,
    pub to: SystemState,
}

#[derive(Debug, thiserror::Error)]
#[error("resume not allowed: {0}")]
pub struct ResumeNotAllowedError(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorResult {
    pub healthy: bool,
    pub halt_trigger: Option<HaltTrigger>,
    pub halt_level: Option<HaltLevel>,
    pub details: String,
}

impl MonitorResult {
    pub fn healthy(details: impl Into<String>) -> Self {
        Self {
            healthy: true,
            halt_trigger: None,
            halt_level: None,
            details: details.into(),
        }
    }

    pub fn halt(trigger: HaltTrigger, level: HaltLevel, details: impl Into<String>) -> Self {
        Self {
            healthy: false,
            halt_trigger: Some(trigger),
            halt_level: Some(level),
            details: details.into(),
        }
    }

    /// Severity used when coalescing concurrently-returned monitor results:
    /// higher `HaltLevel` wins, healthy results never outrank a halt.
    pub fn severity(&self) -> Option<HaltLevel> {
        self.halt_level
    }
}
