//! Shared types for the Data-Source Health subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthState {
    Healthy,
    Degraded,
    Critical,
    Unknown,
}

impl HealthState {
    /// HEALTHY >= 85, DEGRADED 65-84, CRITICAL < 65 (spec §3).
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            HealthState::Healthy
        } else if score >= 65.0 {
            HealthState::Degraded
        } else {
            HealthState::Critical
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DimensionType {
    Availability,
    Freshness,
    Consistency,
    Completeness,
    ErrorRate,
}

pub const ALL_DIMENSIONS: [DimensionType; 5] = [
    DimensionType::Availability,
    DimensionType::Freshness,
    DimensionType::Consistency,
    DimensionType::Completeness,
    DimensionType::ErrorRate,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: DimensionType,
    /// Raw 0-100 score for this dimension.
    pub score: f64,
    /// `score * weight`, already folded into the final score.
    pub weighted_score: f64,
    pub explanation: String,
    /// True when the scorer had too few samples to be confident.
    pub insufficient_data: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthScore {
    pub source: String,
    pub final_score: f64,
    pub state: HealthState,
    pub dimension_scores: HashMap<DimensionType, DimensionScore>,
    pub previous_state: Option<HealthState>,
    pub evaluation_duration_ms: f64,
    pub evaluated_at: DateTime<Utc>,
}

impl HealthScore {
    /// Risk multiplier consumed by the Risk Budget Manager (spec §4.6):
    /// HEALTHY -> 1.0, DEGRADED -> linear 0.5-0.8 across its band,
    /// CRITICAL/UNKNOWN -> 0.0.
    pub fn risk_multiplier(&self) -> f64 {
        match self.state {
            HealthState::Healthy => 1.0,
            HealthState::Degraded => {
                let band = (self.final_score - 65.0) / (85.0 - 65.0);
                0.5 + band.clamp(0.0, 1.0) * (0.8 - 0.5)
            }
            HealthState::Critical | HealthState::Unknown => 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceHealthTransition {
    pub source: String,
    pub from: HealthState,
    pub to: HealthState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    MarketData,
    OnChain,
    Sentiment,
    News,
    Unknown,
}

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("source not found: {0}")]
    SourceNotFound(String),
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}
