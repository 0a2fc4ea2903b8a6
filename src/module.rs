//! Module-facing interface (spec §6): the contract every pipeline stage's
//! backing component implements so the orchestrator can start, stop, and
//! health-check it uniformly regardless of what it actually does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleHealth {
    pub status: HealthStatus,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub details: Option<String>,
}

impl ModuleHealth {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            last_heartbeat: Some(Utc::now()),
            details: None,
        }
    }

    pub fn unhealthy(details: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            last_heartbeat: None,
            details: Some(details.into()),
        }
    }
}

/// A unit the orchestrator can start, stop, and poll for health.
///
/// `can_trade()` is advisory: the pipeline consults it before the Execute
/// stage, but it never substitutes for the System Risk Controller's
/// authority — a module reporting `true` can still be overridden by a halt.
#[async_trait]
pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> Result<(), crate::error::CoreError>;

    /// Must be idempotent — calling `stop()` on an already-stopped module
    /// is not an error.
    async fn stop(&self) -> Result<(), crate::error::CoreError>;

    async fn health(&self) -> ModuleHealth;

    async fn can_trade(&self) -> bool {
        true
    }
}
