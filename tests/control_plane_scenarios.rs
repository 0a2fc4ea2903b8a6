//! Cross-module scenarios drawn from spec.md §8's literal test cases —
//! exercised against the public crate API rather than internal unit tests,
//! since each one spans more than one module.

use control_plane::alerting::{AlertingService, NullAlertSender};
use control_plane::clock::{Clock, SystemClock};
use control_plane::monitors::{ExecutionMonitor, Monitor};
use control_plane::persistence::PersistenceLog;
use control_plane::risk_budget::{Direction, RiskBudgetConfig, RiskBudgetManager, RiskTracker, TradeRiskRequest};
use control_plane::risk_budget::BudgetDecision;
use control_plane::src_control::{HaltLevel, HaltTrigger, ResumeRequest, SystemRiskController, SystemState, TriggerCategory};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn alerting() -> Arc<AlertingService> {
    Arc::new(AlertingService::new(Box::new(NullAlertSender), Duration::from_secs(60)))
}

/// Scenario 3: drawdown exactly at the cap rejects every subsequent
/// request, and the tracker latches into a halted state regardless of what
/// the request asks for.
#[test]
fn drawdown_cap_rejects_and_latches_halted() {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let config = RiskBudgetConfig { max_drawdown_pct: 12.0, ..RiskBudgetConfig::default() };
    let tracker = Arc::new(RiskTracker::new(config, clock.clone(), 1500.0));
    let manager = RiskBudgetManager::new(tracker.clone(), clock.clone(), alerting());

    manager.update_equity(1320.0, clock.now_utc());

    let request = TradeRiskRequest {
        request_id: Uuid::new_v4(),
        symbol: "BTCUSD".into(),
        exchange: "test".into(),
        direction: Direction::Long,
        entry_price: 60_000.0,
        stop_loss_price: 59_500.0,
        position_size: 0.01,
    };

    let result = manager.evaluate(&request);
    assert!(matches!(result.decision, BudgetDecision::Reject { .. }));

    let second = manager.evaluate(&request);
    assert!(matches!(second.decision, BudgetDecision::Reject { .. }));
}

/// Scenario 4: a hard halt transitions the controller to HALTED_HARD,
/// blocks trading, and refuses automatic resume until an operator
/// acknowledges.
#[tokio::test]
async fn hard_halt_blocks_trading_until_acknowledged_resume() {
    let persistence = Arc::new(PersistenceLog::open_in_memory().unwrap());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let monitors: Vec<Arc<dyn Monitor>> = vec![Arc::new(ExecutionMonitor::new(
        Default::default(),
        Box::new(control_plane::monitors::StaticSnapshotProvider(
            control_plane::monitors::execution::ExecutionSnapshot {
                rejections_in_window: 0,
                max_slippage_bps_in_window: 0.0,
                exchange_position: None,
                tracker_position: None,
                unconfirmed_orders: 0,
                exchange_errors_in_window: 0,
                oldest_pending_order_age_secs: 0,
            },
        )),
    ))];

    let src = SystemRiskController::new(monitors, clock, persistence, alerting());
    assert_eq!(src.state(), SystemState::Running);
    assert!(src.can_trade());

    let trigger = HaltTrigger::new(TriggerCategory::Execution, "EX_POSITION_MISMATCH", "tracker vs exchange position mismatch");
    src.request_halt(trigger, HaltLevel::Hard, None).unwrap();

    assert_eq!(src.state(), SystemState::HaltedHard);
    assert!(!src.can_trade());

    assert!(src.auto_resume().is_err());

    let request = ResumeRequest { operator: "oncall".into(), reason: "confirmed position reconciled".into(), acknowledged: true };
    src.request_resume(request).unwrap();
    assert_eq!(src.state(), SystemState::Running);
    assert!(src.can_trade());
}
