//! Data contracts for the Risk Budget Manager (spec §3, §4.3).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Open,
    PartiallyClosed,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRiskRequest {
    pub request_id: Uuid,
    pub symbol: String,
    pub exchange: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss_price: f64,
    pub position_size: f64,
}

impl TradeRiskRequest {
    pub fn risk_amount(&self) -> f64 {
        (self.entry_price - self.stop_loss_price).abs() * self.position_size
    }

    pub fn risk_pct(&self, equity: f64) -> f64 {
        if equity <= 0.0 {
            return f64::INFINITY;
        }
        self.risk_amount() / equity * 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPositionRisk {
    pub position_id: Uuid,
    pub symbol: String,
    pub exchange: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub current_stop: f64,
    pub size: f64,
    pub risk_amount: f64,
    pub risk_pct: f64,
    pub equity_at_entry: f64,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub realized_pnl: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRiskUsage {
    pub date: NaiveDate,
    pub budget_limit_pct: f64,
    pub consumed_pct: f64,
    pub peak_open_pct: f64,
    pub trades_taken: u32,
    pub trades_rejected: u32,
    pub realized_pnl: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    InvalidParameters,
    TradingHalted,
    StaleEquityData,
    DrawdownLimitBreached,
    DailyExhausted,
    OpenLimit,
    PerTrade,
    RemainingDaily,
    RemainingOpen,
    DuplicateSymbolPosition,
    ConsecutiveLossLimit,
    /// Absolute cap on open position count. Distinct from `OpenLimit` (the
    /// open-risk percentage budget): this one is a hard gate, never a
    /// reducible dimension, so it never appears in `REJECT_PRIORITY`.
    MaxPositionsReached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision")]
pub enum BudgetDecision {
    Allow { allowed_size: f64, allowed_risk_pct: f64 },
    ReduceSize { allowed_size: f64, allowed_risk_pct: f64, primary_reason: RejectReason },
    Reject { primary_reason: RejectReason },
}

#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub passed: bool,
    pub reason: Option<RejectReason>,
    /// Remaining budget in this dimension, if the dimension has one.
    pub remaining_pct: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct BudgetCheckResult {
    pub request_id: Uuid,
    pub decision: BudgetDecision,
    pub proposed_risk_pct: f64,
    pub checks: Vec<(&'static str, CheckOutcome)>,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RiskBudgetSnapshot {
    pub equity: f64,
    pub peak_equity: f64,
    pub current_drawdown_pct: f64,
    pub open_positions: Vec<OpenPositionRisk>,
    pub open_used_pct: f64,
    pub daily: DailyRiskUsage,
    pub consecutive_losses: u32,
    pub is_halted: bool,
    pub equity_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EquityUpdate {
    pub equity: f64,
    pub at: DateTime<Utc>,
}
