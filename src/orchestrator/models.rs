//! Orchestrator data model (spec §4.1).
//!
//! Grounded on `original_source/orchestrator/models.py`'s public surface
//! (`RuntimeMode`, `ExecutionStage`, `ModuleStatus`, `StageResult`,
//! `CycleResult` — bodies stripped from the reference, names and the
//! stage ordering come from spec.md §4.1 directly).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStage {
    Ingest,
    Process,
    RiskScore,
    Strategy,
    Execute,
    Monitor,
}

pub const ALL_STAGES: [ExecutionStage; 6] = [
    ExecutionStage::Ingest,
    ExecutionStage::Process,
    ExecutionStage::RiskScore,
    ExecutionStage::Strategy,
    ExecutionStage::Execute,
    ExecutionStage::Monitor,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Full,
    Ingest,
    Process,
    Risk,
    Trade,
    Backtest,
    Monitor,
}

impl RuntimeMode {
    /// Stage subset this mode drives, in execution order (spec §4.1: "each
    /// mode declares its stage set").
    pub fn stages(self) -> &'static [ExecutionStage] {
        use ExecutionStage::*;
        match self {
            RuntimeMode::Full => &[Ingest, Process, RiskScore, Strategy, Execute, Monitor],
            RuntimeMode::Ingest => &[Ingest],
            RuntimeMode::Process => &[Ingest, Process],
            RuntimeMode::Risk => &[Ingest, Process, RiskScore],
            RuntimeMode::Trade => &[Ingest, Process, RiskScore, Strategy, Execute],
            RuntimeMode::Backtest => &[Process, RiskScore, Strategy, Execute],
            RuntimeMode::Monitor => &[Monitor],
        }
    }

    pub fn from_env_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Some(RuntimeMode::Full),
            "ingest" => Some(RuntimeMode::Ingest),
            "process" => Some(RuntimeMode::Process),
            "risk" => Some(RuntimeMode::Risk),
            "trade" => Some(RuntimeMode::Trade),
            "backtest" => Some(RuntimeMode::Backtest),
            "monitor" => Some(RuntimeMode::Monitor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleStatus {
    NotStarted,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Success,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: ExecutionStage,
    pub status: StageStatus,
    pub duration: Duration,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleResult {
    pub cycle_id: Uuid,
    pub mode: RuntimeMode,
    pub stages: Vec<StageResult>,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
}

impl CycleResult {
    pub fn all_succeeded(&self) -> bool {
        self.stages.iter().all(|s| s.status == StageStatus::Success)
    }
}

/// What the pipeline tells the orchestrator to do after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Continue,
    StopLifecycle,
    EmergencyStop,
}
