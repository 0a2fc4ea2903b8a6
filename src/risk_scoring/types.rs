//! Data contracts for the Risk Scoring Engine (spec §4.2).
//!
//! Capital-agnostic by construction: no field here carries equity, position
//! size, stop distance, or a dollar amount. Grounded on
//! `original_source/risk_scoring/types.py`'s dimension/state split.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum RiskState {
    Safe = 0,
    Warning = 1,
    Dangerous = 2,
}

impl RiskState {
    pub fn value(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskDimension {
    Market,
    Liquidity,
    Volatility,
    SystemIntegrity,
}

pub const ALL_DIMENSIONS: [RiskDimension; 4] = [
    RiskDimension::Market,
    RiskDimension::Liquidity,
    RiskDimension::Volatility,
    RiskDimension::SystemIntegrity,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// LOW 0-2, MEDIUM 3-4, HIGH 5-6, CRITICAL 7-8 (spec §3).
    pub fn from_total(total: u8) -> Self {
        match total {
            0..=2 => RiskLevel::Low,
            3..=4 => RiskLevel::Medium,
            5..=6 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataFreshnessStatus {
    Fresh,
    Stale,
    Missing,
}

/// One metric's contribution to a dimension's assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub metric: String,
    pub value: f64,
    pub state: RiskState,
    pub threshold_used: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionAssessment {
    pub dimension: RiskDimension,
    pub state: RiskState,
    pub reason: String,
    pub contributing_factors: Vec<ContributingFactor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskScoreResult {
    pub total: u8,
    pub level: RiskLevel,
    pub dimensions: HashMap<RiskDimension, DimensionAssessment>,
    pub insufficient_data: bool,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RiskStateChange {
    pub dimension: Option<RiskDimension>,
    pub from_state: RiskState,
    pub to_state: RiskState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
#[error("insufficient data for risk scoring: {0}")]
pub struct InsufficientDataError(pub String);

/// Inputs for the MARKET dimension: broad instability signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataInput {
    pub trend_reversal_count_1h: u32,
    pub correlation_breakdown_pct: f64,
}

/// Inputs for the LIQUIDITY dimension: volume and spread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityDataInput {
    pub spread_bps: f64,
    pub volume_ratio_vs_avg: f64,
    pub order_book_depth_ratio: f64,
}

/// Inputs for the VOLATILITY dimension: short-term range expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityDataInput {
    pub atr_ratio_vs_baseline: f64,
    pub price_range_pct_1h: f64,
}

/// Inputs for the SYSTEM_INTEGRITY dimension: pipeline and data health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemIntegrityDataInput {
    pub freshness: DataFreshnessStatus,
    pub pipeline_error_rate_pct: f64,
    pub clock_skew_ms: f64,
}
