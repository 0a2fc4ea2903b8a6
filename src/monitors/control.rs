//! Control monitor (spec §4.4): the System Risk Controller's view into the
//! Risk Budget Manager's own tracked state, plus an optional fold-in of the
//! advisory Risk Committee's verdict (SPEC_FULL.md §B.7). The committee
//! itself has no authority; a BLOCK verdict only ever becomes a
//! *contributing factor* this monitor may act on.
//!
//! Grounded on `original_source/system_risk_controller/monitors/control.py`'s
//! trigger catalogue.

use super::SnapshotProvider;
use crate::committee::CommitteeDecision;
use crate::risk_budget::RiskBudgetSnapshot;
use crate::src_control::types::{HaltLevel, HaltTrigger, MonitorResult, TriggerCategory};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct ControlSnapshot {
    pub budget: RiskBudgetSnapshot,
    pub committee_decision: Option<CommitteeDecision>,
    pub committee_reason: Option<String>,
    pub observed_leverage: f64,
}

#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Independent, higher-severity authority cap on top of the tracker's
    /// own `max_drawdown_pct` — a second line of defense if the tracker's
    /// own halt somehow fails to fire.
    pub drawdown_control_cap_pct: f64,
    pub max_leverage: f64,
    pub consecutive_loss_limit: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            drawdown_control_cap_pct: 15.0,
            max_leverage: 3.0,
            consecutive_loss_limit: 6,
        }
    }
}

fn trigger(name: &str, reason: impl Into<String>) -> HaltTrigger {
    HaltTrigger::new(TriggerCategory::Control, name, reason)
}

pub fn assess(config: &ControlConfig, snapshot: &ControlSnapshot) -> MonitorResult {
    if snapshot.budget.current_drawdown_pct >= config.drawdown_control_cap_pct {
        return MonitorResult::halt(
            trigger(
                "DRAWDOWN_EXCEEDED",
                format!("{:.2}% at or beyond control cap {:.2}%", snapshot.budget.current_drawdown_pct, config.drawdown_control_cap_pct),
            ),
            HaltLevel::Hard,
            "drawdown beyond control authority cap",
        );
    }

    if snapshot.observed_leverage > config.max_leverage {
        return MonitorResult::halt(
            trigger("LEVERAGE_EXCEEDED", format!("observed leverage {:.2}x", snapshot.observed_leverage)),
            HaltLevel::Hard,
            "leverage exceeds configured maximum",
        );
    }

    if snapshot.budget.consecutive_losses >= config.consecutive_loss_limit {
        return MonitorResult::halt(
            trigger("LOSS_LIMIT_BREACHED", format!("{} consecutive losses", snapshot.budget.consecutive_losses)),
            HaltLevel::Hard,
            "consecutive loss limit breached",
        );
    }

    if snapshot.budget.is_halted {
        return MonitorResult::halt(
            trigger("RISK_LIMIT_VIOLATED", "risk budget manager reports an active internal halt"),
            HaltLevel::Soft,
            "risk budget manager halted trading internally",
        );
    }

    if let Some(CommitteeDecision::Block) = snapshot.committee_decision {
        return MonitorResult::halt(
            trigger(
                "STRATEGY_DEVIATION",
                snapshot.committee_reason.clone().unwrap_or_else(|| "risk committee blocked".to_string()),
            ),
            HaltLevel::Soft,
            "risk committee advisory verdict: BLOCK",
        );
    }

    if snapshot.budget.open_used_pct >= snapshot.budget.daily.budget_limit_pct {
        return MonitorResult::halt(
            trigger("EXPOSURE_LIMIT_BREACHED", format!("open exposure {:.2}%", snapshot.budget.open_used_pct)),
            HaltLevel::Soft,
            "open exposure at or beyond daily budget limit",
        );
    }

    MonitorResult::healthy("control checks nominal")
}

pub struct ControlMonitor {
    config: ControlConfig,
    provider: Box<dyn SnapshotProvider<ControlSnapshot>>,
}

impl ControlMonitor {
    pub fn new(config: ControlConfig, provider: Box<dyn SnapshotProvider<ControlSnapshot>>) -> Self {
        Self { config, provider }
    }
}

#[async_trait]
impl super::Monitor for ControlMonitor {
    fn name(&self) -> &str {
        "control"
    }

    async fn evaluate(&self) -> MonitorResult {
        match self.provider.snapshot() {
            Some(snapshot) => assess(&self.config, &snapshot),
            None => MonitorResult::halt(
                trigger("RISK_LIMIT_VIOLATED", "snapshot provider unavailable"),
                HaltLevel::Hard,
                "could not obtain control snapshot",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk_budget::DailyRiskUsage;
    use chrono::Utc;

    fn baseline() -> ControlSnapshot {
        ControlSnapshot {
            budget: RiskBudgetSnapshot {
                equity: 10_000.0,
                peak_equity: 10_000.0,
                current_drawdown_pct: 0.0,
                open_positions: vec![],
                open_used_pct: 0.0,
                daily: DailyRiskUsage {
                    date: Utc::now().date_naive(),
                    budget_limit_pct: 6.0,
                    consumed_pct: 0.0,
                    peak_open_pct: 0.0,
                    trades_taken: 0,
                    trades_rejected: 0,
                    realized_pnl: 0.0,
                },
                consecutive_losses: 0,
                is_halted: false,
                equity_updated_at: Utc::now(),
            },
            committee_decision: None,
            committee_reason: None,
            observed_leverage: 1.0,
        }
    }

    #[test]
    fn nominal_snapshot_is_healthy() {
        assert!(assess(&ControlConfig::default(), &baseline()).healthy);
    }

    #[test]
    fn drawdown_at_control_cap_halts_hard() {
        let mut snapshot = baseline();
        snapshot.budget.current_drawdown_pct = 15.0;
        let result = assess(&ControlConfig::default(), &snapshot);
        assert_eq!(result.halt_level, Some(HaltLevel::Hard));
        assert_eq!(result.halt_trigger.unwrap().code, "CT_DRAWDOWN_EXCEEDED");
    }

    #[test]
    fn committee_block_halts_soft() {
        let mut snapshot = baseline();
        snapshot.committee_decision = Some(CommitteeDecision::Block);
        snapshot.committee_reason = Some("capital safety breach".to_string());
        let result = assess(&ControlConfig::default(), &snapshot);
        assert_eq!(result.halt_trigger.unwrap().code, "CT_STRATEGY_DEVIATION");
    }

    #[test]
    fn internal_tracker_halt_is_surfaced() {
        let mut snapshot = baseline();
        snapshot.budget.is_halted = true;
        let result = assess(&ControlConfig::default(), &snapshot);
        assert_eq!(result.halt_trigger.unwrap().code, "CT_RISK_LIMIT_VIOLATED");
    }
}
