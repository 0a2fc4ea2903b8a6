//! Risk Budget Manager: the authority gate every trade must pass (spec
//! §4.3). Implements the nine-step evaluation protocol in fixed order,
//! records every dimension regardless of where the first failure occurred,
//! and synthesizes ALLOW/REDUCE_SIZE/REJECT.
//!
//! Grounded on `original_source/risk_budget_manager/engine.py`'s
//! `_do_evaluation`/`_calculate_max_allowable_risk`/`_get_primary_reject_reason`,
//! and on its consecutive-error escalation and warning-threshold alerting.

use super::tracker::RiskTracker;
use super::types::{BudgetCheckResult, BudgetDecision, CheckOutcome, RejectReason, TradeRiskRequest};
use crate::alerting::{Alert, AlertSeverity, AlertingService};
use crate::clock::Clock;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, warn};

/// Priority order used to pick the primary reason when several dimensions
/// fail at once. Earlier entries win.
const REJECT_PRIORITY: &[RejectReason] = &[
    RejectReason::DrawdownLimitBreached,
    RejectReason::DailyExhausted,
    RejectReason::OpenLimit,
    RejectReason::PerTrade,
    RejectReason::RemainingDaily,
    RejectReason::RemainingOpen,
];

pub struct RiskBudgetManager {
    tracker: Arc<RiskTracker>,
    clock: Arc<dyn Clock>,
    alerting: Arc<AlertingService>,
    consecutive_errors: Mutex<u32>,
}

impl RiskBudgetManager {
    pub fn new(tracker: Arc<RiskTracker>, clock: Arc<dyn Clock>, alerting: Arc<AlertingService>) -> Self {
        Self {
            tracker,
            clock,
            alerting,
            consecutive_errors: Mutex::new(0),
        }
    }

    pub fn update_equity(&self, equity: f64, at: DateTime<Utc>) {
        self.tracker.update_equity(equity, at);
        self.check_warning_thresholds();
    }

    fn check_warning_thresholds(&self) {
        let snapshot = self.tracker.snapshot();
        let config = self.tracker.config();

        let daily_usage_pct = if snapshot.daily.budget_limit_pct > 0.0 {
            snapshot.daily.consumed_pct / snapshot.daily.budget_limit_pct * 100.0
        } else {
            0.0
        };
        if daily_usage_pct >= config.daily_warning_threshold_pct {
            self.alerting.emit(
                "risk_budget:daily_usage",
                Alert {
                    severity: AlertSeverity::Warning,
                    title: "daily risk budget usage high".into(),
                    message: format!("{daily_usage_pct:.1}% of daily budget consumed"),
                },
            );
        }

        let drawdown_usage_pct = if config.max_drawdown_pct > 0.0 {
            snapshot.current_drawdown_pct / config.max_drawdown_pct * 100.0
        } else {
            0.0
        };
        if drawdown_usage_pct >= config.drawdown_warning_threshold_pct {
            self.alerting.emit(
                "risk_budget:drawdown",
                Alert {
                    severity: AlertSeverity::Warning,
                    title: "drawdown approaching limit".into(),
                    message: format!("drawdown at {:.2}% of {:.2}% cap", snapshot.current_drawdown_pct, config.max_drawdown_pct),
                },
            );
        }
    }

    /// Evaluate one trade request against all nine dimensions. Any internal
    /// panic boundary is the caller's to avoid; this function itself never
    /// panics on valid input, but a caller that wraps it in a fallible
    /// pipeline should route failures through `handle_evaluation_error`.
    pub fn evaluate(&self, request: &TradeRiskRequest) -> BudgetCheckResult {
        self.tracker.roll_day_if_needed();
        let now = self.clock.now_utc();
        let snapshot = self.tracker.snapshot();
        let config = self.tracker.config();
        let tier = config.tier_for(snapshot.equity);
        let mut checks: Vec<(&'static str, CheckOutcome)> = Vec::new();

        // 1. validate
        let valid = request.position_size > 0.0
            && snapshot.equity > 0.0
            && match request.direction {
                super::types::Direction::Long => request.stop_loss_price < request.entry_price,
                super::types::Direction::Short => request.stop_loss_price > request.entry_price,
            };
        if !valid {
            self.tracker.reject_recorded();
            *self.consecutive_errors.lock() = 0;
            return self.reject(request.request_id, now, 0.0, RejectReason::InvalidParameters, vec![(
                "validate",
                CheckOutcome {
                    passed: false,
                    reason: Some(RejectReason::InvalidParameters),
                    remaining_pct: None,
                },
            )]);
        }
        checks.push((
            "validate",
            CheckOutcome {
                passed: true,
                reason: None,
                remaining_pct: None,
            },
        ));
        let proposed_risk_pct = request.risk_pct(snapshot.equity);

        // 2. system gate
        let equity_age = now - snapshot.equity_updated_at;
        let stale = equity_age.num_seconds() >= config.max_staleness_seconds;
        let below_floor = snapshot.equity < config.min_equity_floor;
        if snapshot.is_halted || stale || below_floor {
            self.tracker.reject_recorded();
            *self.consecutive_errors.lock() = 0;
            let reason = if snapshot.is_halted {
                RejectReason::TradingHalted
            } else {
                RejectReason::StaleEquityData
            };
            checks.push((
                "system_gate",
                CheckOutcome {
                    passed: false,
                    reason: Some(reason),
                    remaining_pct: None,
                },
            ));
            return self.reject(request.request_id, now, proposed_risk_pct, reason, checks);
        }
        checks.push((
            "system_gate",
            CheckOutcome {
                passed: true,
                reason: None,
                remaining_pct: None,
            },
        ));

        // 3. drawdown
        if snapshot.current_drawdown_pct >= config.max_drawdown_pct {
            self.tracker.halt_trading(true);
            self.alerting.emit(
                "risk_budget:drawdown_breach",
                Alert {
                    severity: AlertSeverity::Emergency,
                    title: "drawdown limit breached".into(),
                    message: format!("drawdown {:.2}% >= cap {:.2}%", snapshot.current_drawdown_pct, config.max_drawdown_pct),
                },
            );
            self.tracker.reject_recorded();
            *self.consecutive_errors.lock() = 0;
            checks.push((
                "drawdown",
                CheckOutcome {
                    passed: false,
                    reason: Some(RejectReason::DrawdownLimitBreached),
                    remaining_pct: None,
                },
            ));
            return self.reject(request.request_id, now, proposed_risk_pct, RejectReason::DrawdownLimitBreached, checks);
        }
        checks.push((
            "drawdown",
            CheckOutcome {
                passed: true,
                reason: None,
                remaining_pct: None,
            },
        ));

        // 4. position count — an absolute gate, not a reducible dimension:
        // no amount of size reduction satisfies it, so it must reject
        // before decision synthesis rather than feed `max_allowable`.
        let count_passed = (snapshot.open_positions.len() as u32) < tier.max_positions;
        if !count_passed {
            self.tracker.reject_recorded();
            *self.consecutive_errors.lock() = 0;
            checks.push((
                "position_count",
                CheckOutcome {
                    passed: false,
                    reason: Some(RejectReason::MaxPositionsReached),
                    remaining_pct: None,
                },
            ));
            return self.reject(request.request_id, now, proposed_risk_pct, RejectReason::MaxPositionsReached, checks);
        }
        checks.push((
            "position_count",
            CheckOutcome {
                passed: true,
                reason: None,
                remaining_pct: None,
            },
        ));

        // 5. per-trade
        let mut per_trade_limit = tier.per_trade_limit_pct;
        if snapshot.current_drawdown_pct >= config.reduce_when_drawdown_pct {
            per_trade_limit *= config.drawdown_reduction_factor;
        }
        let per_trade_passed = proposed_risk_pct <= per_trade_limit;
        checks.push((
            "per_trade",
            CheckOutcome {
                passed: per_trade_passed,
                reason: (!per_trade_passed).then_some(RejectReason::PerTrade),
                remaining_pct: Some(per_trade_limit),
            },
        ));

        // 6. daily cumulative
        let daily_remaining = (tier.daily_limit_pct - snapshot.daily.consumed_pct).max(0.0);
        let daily_passed = proposed_risk_pct <= daily_remaining;
        checks.push((
            "daily",
            CheckOutcome {
                passed: daily_passed,
                reason: (!daily_passed).then_some(RejectReason::RemainingDaily),
                remaining_pct: Some(daily_remaining),
            },
        ));

        // 7. open-position aggregate
        let open_remaining = (tier.open_limit_pct - snapshot.open_used_pct).max(0.0);
        let open_passed = proposed_risk_pct <= open_remaining;
        checks.push((
            "open_position",
            CheckOutcome {
                passed: open_passed,
                reason: (!open_passed).then_some(RejectReason::RemainingOpen),
                remaining_pct: Some(open_remaining),
            },
        ));

        // 8. pyramiding
        let duplicate = !config.allow_pyramiding && self.tracker.has_position_for_symbol(&request.symbol);
        if duplicate {
            self.tracker.reject_recorded();
            *self.consecutive_errors.lock() = 0;
            checks.push((
                "pyramiding",
                CheckOutcome {
                    passed: false,
                    reason: Some(RejectReason::DuplicateSymbolPosition),
                    remaining_pct: None,
                },
            ));
            return self.reject(request.request_id, now, proposed_risk_pct, RejectReason::DuplicateSymbolPosition, checks);
        }
        checks.push((
            "pyramiding",
            CheckOutcome {
                passed: true,
                reason: None,
                remaining_pct: None,
            },
        ));

        // 9. consecutive losses
        let losses_passed = snapshot.consecutive_losses < config.hard_stop_after_losses;
        if !losses_passed {
            self.tracker.reject_recorded();
            *self.consecutive_errors.lock() = 0;
            checks.push((
                "consecutive_losses",
                CheckOutcome {
                    passed: false,
                    reason: Some(RejectReason::ConsecutiveLossLimit),
                    remaining_pct: None,
                },
            ));
            return self.reject(request.request_id, now, proposed_risk_pct, RejectReason::ConsecutiveLossLimit, checks);
        }
        checks.push((
            "consecutive_losses",
            CheckOutcome {
                passed: true,
                reason: None,
                remaining_pct: None,
            },
        ));

        *self.consecutive_errors.lock() = 0;

        let all_passed = checks.iter().all(|(_, c)| c.passed);
        if all_passed {
            return BudgetCheckResult {
                request_id: request.request_id,
                decision: BudgetDecision::Allow {
                    allowed_size: request.position_size,
                    allowed_risk_pct: proposed_risk_pct,
                },
                proposed_risk_pct,
                checks,
                evaluated_at: now,
            };
        }

        let max_allowable = checks
            .iter()
            .filter_map(|(_, c)| c.remaining_pct)
            .fold(f64::INFINITY, f64::min);

        let reduced_meets_floor = max_allowable > 0.0
            && proposed_risk_pct > 0.0
            && (max_allowable / proposed_risk_pct) * proposed_risk_pct >= config.min_risk_pct;

        if max_allowable <= 0.0 || !reduced_meets_floor {
            self.tracker.reject_recorded();
            let primary = self.primary_reject_reason(&checks);
            return self.reject(request.request_id, now, proposed_risk_pct, primary, checks);
        }

        let allowed_size = request.position_size * max_allowable / proposed_risk_pct;
        let primary = self.primary_reject_reason(&checks);
        BudgetCheckResult {
            request_id: request.request_id,
            decision: BudgetDecision::ReduceSize {
                allowed_size,
                allowed_risk_pct: max_allowable,
                primary_reason: primary,
            },
            proposed_risk_pct,
            checks,
            evaluated_at: now,
        }
    }

    fn primary_reject_reason(&self, checks: &[(&'static str, CheckOutcome)]) -> RejectReason {
        for candidate in REJECT_PRIORITY {
            if checks.iter().any(|(_, c)| c.reason == Some(*candidate)) {
                return *candidate;
            }
        }
        RejectReason::InvalidParameters
    }

    fn reject(
        &self,
        request_id: uuid::Uuid,
        now: DateTime<Utc>,
        proposed_risk_pct: f64,
        reason: RejectReason,
        checks: Vec<(&'static str, CheckOutcome)>,
    ) -> BudgetCheckResult {
        BudgetCheckResult {
            request_id,
            decision: BudgetDecision::Reject { primary_reason: reason },
            proposed_risk_pct,
            checks,
            evaluated_at: now,
        }
    }

    /// Escalates on repeated evaluation failures: a single error is logged
    /// at CRITICAL, three consecutive ones raise an EMERGENCY alert.
    /// Grounded on `_handle_evaluation_error`.
    pub fn handle_evaluation_error(&self, err: &str) {
        let mut count = self.consecutive_errors.lock();
        *count += 1;
        error!(error = err, consecutive = *count, "risk budget evaluation failed");
        self.alerting.emit(
            "risk_budget:evaluation_error",
            Alert {
                severity: AlertSeverity::Critical,
                title: "risk budget evaluation error".into(),
                message: err.to_string(),
            },
        );
        if *count >= 3 {
            warn!(consecutive = *count, "three consecutive risk budget evaluation failures");
            self.alerting.emit(
                "risk_budget:evaluation_error_burst",
                Alert {
                    severity: AlertSeverity::Emergency,
                    title: "repeated risk budget evaluation failures".into(),
                    message: format!("{count} consecutive evaluation errors"),
                },
            );
        }
    }

    pub fn tracker(&self) -> &Arc<RiskTracker> {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::NullAlertSender;
    use crate::clock::SystemClock;
    use crate::risk_budget::config::RiskBudgetConfig;
    use crate::risk_budget::types::Direction;
    use std::time::Duration;
    use uuid::Uuid;

    fn manager(equity: f64) -> RiskBudgetManager {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let tracker = Arc::new(RiskTracker::new(RiskBudgetConfig::default(), clock.clone(), equity));
        let alerting = Arc::new(AlertingService::new(Box::new(NullAlertSender), Duration::from_secs(60)));
        RiskBudgetManager::new(tracker, clock, alerting)
    }

    fn request(entry: f64, stop: f64, size: f64) -> TradeRiskRequest {
        TradeRiskRequest {
            request_id: Uuid::new_v4(),
            symbol: "BTCUSDT".into(),
            exchange: "binance".into(),
            direction: Direction::Long,
            entry_price: entry,
            stop_loss_price: stop,
            position_size: size,
        }
    }

    #[test]
    fn happy_path_allows_at_requested_size() {
        let m = manager(1500.0);
        let result = m.evaluate(&request(60000.0, 59500.0, 0.01));
        match result.decision {
            BudgetDecision::Allow { allowed_size, allowed_risk_pct } => {
                assert_eq!(allowed_size, 0.01);
                assert!((allowed_risk_pct - 0.333).abs() < 0.01);
            }
            other => panic!("expected ALLOW, got {other:?}"),
        }
    }

    #[test]
    fn reduce_on_remaining_daily_budget() {
        let m = manager(1500.0);
        // Consume 1.3% of the 1.5% daily budget via a prior position.
        let prior = m.tracker.register_position_opened("ETHUSDT", "binance", Direction::Long, 1.0, 1.0, 1.0, 1.3);
        let _ = prior;
        let result = m.evaluate(&request(60000.0, 59700.0, 0.01));
        match result.decision {
            BudgetDecision::ReduceSize { allowed_size, primary_reason, .. } => {
                assert_eq!(primary_reason, RejectReason::RemainingDaily);
                assert!(allowed_size > 0.0 && allowed_size < 0.01);
            }
            other => panic!("expected REDUCE_SIZE, got {other:?}"),
        }
    }

    #[test]
    fn drawdown_breach_halts_and_rejects_subsequent_requests() {
        let m = manager(1500.0);
        m.tracker.update_equity(1320.0, Utc::now());
        let first = m.evaluate(&request(60000.0, 59500.0, 0.01));
        match first.decision {
            BudgetDecision::Reject { primary_reason } => assert_eq!(primary_reason, RejectReason::DrawdownLimitBreached),
            other => panic!("expected REJECT, got {other:?}"),
        }
        let second = m.evaluate(&request(60000.0, 59500.0, 0.01));
        match second.decision {
            BudgetDecision::Reject { primary_reason } => assert_eq!(primary_reason, RejectReason::TradingHalted),
            other => panic!("expected REJECT(TRADING_HALTED), got {other:?}"),
        }
    }

    #[test]
    fn proposed_risk_exactly_at_per_trade_limit_allows() {
        let m = manager(1000.0);
        // per_trade_limit_pct = 0.5 at the base tier; risk_amount = 5 => 0.5%.
        let result = m.evaluate(&request(100.0, 95.0, 1.0));
        assert!(matches!(result.decision, BudgetDecision::Allow { .. }));
    }

    #[test]
    fn duplicate_symbol_rejects_without_pyramiding() {
        let m = manager(1500.0);
        m.tracker.register_position_opened("BTCUSDT", "binance", Direction::Long, 60000.0, 59500.0, 0.01, 0.1);
        let result = m.evaluate(&request(60000.0, 59500.0, 0.01));
        match result.decision {
            BudgetDecision::Reject { primary_reason } => assert_eq!(primary_reason, RejectReason::DuplicateSymbolPosition),
            other => panic!("expected REJECT, got {other:?}"),
        }
    }
}
