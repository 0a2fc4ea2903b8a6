//! Risk Budget Manager (spec §4.3): the authority gate every trade must
//! pass before execution. No bypass exists.

pub mod config;
pub mod engine;
pub mod tracker;
pub mod types;

pub use config::{CapitalTier, RiskBudgetConfig};
pub use engine::RiskBudgetManager;
pub use tracker::RiskTracker;
pub use types::{
    BudgetCheckResult, BudgetDecision, CheckOutcome, DailyRiskUsage, Direction, EquityUpdate, OpenPositionRisk,
    PositionStatus, RejectReason, RiskBudgetSnapshot, TradeRiskRequest,
};
