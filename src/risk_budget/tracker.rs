//! Owns all open-position and daily-budget state for one account.
//!
//! Grounded on `original_source/risk_budget_manager/tracker.py`'s
//! `RiskTracker`: a single reentrant-lock-guarded state object so evaluation
//! and registration are atomic and partial updates are never visible (spec
//! §4.3 concurrency note). `parking_lot::RwLock` stands in for the
//! original's `threading.RLock` — call sites never re-enter while holding
//! the lock, so a plain reader/writer lock is sufficient.

use super::config::RiskBudgetConfig;
use super::types::{DailyRiskUsage, Direction, OpenPositionRisk, PositionStatus, RiskBudgetSnapshot};
use crate::clock::Clock;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct TrackerState {
    equity: f64,
    equity_updated_at: DateTime<Utc>,
    peak_equity: f64,
    open_positions: HashMap<Uuid, OpenPositionRisk>,
    open_used_pct: f64,
    peak_open_pct: f64,
    daily: DailyRiskUsage,
    consecutive_losses: u32,
    is_halted: bool,
    requires_manual_resume: bool,
}

fn new_daily(date: NaiveDate, limit_pct: f64) -> DailyRiskUsage {
    DailyRiskUsage {
        date,
        budget_limit_pct: limit_pct,
        consumed_pct: 0.0,
        peak_open_pct: 0.0,
        trades_taken: 0,
        trades_rejected: 0,
        realized_pnl: 0.0,
    }
}

fn trading_day_for(config: &RiskBudgetConfig, at: DateTime<Utc>) -> NaiveDate {
    let shifted = at - chrono::Duration::hours(config.daily_reset_hour_utc as i64);
    shifted.date_naive()
}

pub struct RiskTracker {
    config: RiskBudgetConfig,
    clock: Arc<dyn Clock>,
    state: RwLock<TrackerState>,
}

impl RiskTracker {
    pub fn new(config: RiskBudgetConfig, clock: Arc<dyn Clock>, starting_equity: f64) -> Self {
        let now = clock.now_utc();
        let daily_limit = config.tier_for(starting_equity).daily_limit_pct;
        let state = TrackerState {
            equity: starting_equity,
            equity_updated_at: now,
            peak_equity: starting_equity,
            open_positions: HashMap::new(),
            open_used_pct: 0.0,
            peak_open_pct: 0.0,
            daily: new_daily(trading_day_for(&config, now), daily_limit),
            consecutive_losses: 0,
            is_halted: false,
            requires_manual_resume: false,
        };
        Self {
            config,
            clock,
            state: RwLock::new(state),
        }
    }

    /// Roll over to a fresh trading day if the clock has crossed the
    /// configured reset hour since the daily record was opened. Archives
    /// nothing itself — callers that need history persist the outgoing
    /// `DailyRiskUsage` before calling this.
    fn maybe_roll_day(&self, state: &mut TrackerState, now: DateTime<Utc>) -> Option<DailyRiskUsage> {
        let today = trading_day_for(&self.config, now);
        if today == state.daily.date {
            return None;
        }
        let outgoing = state.daily.clone();
        let daily_limit = self.config.tier_for(state.equity).daily_limit_pct;
        state.daily = new_daily(today, daily_limit);
        state.consecutive_losses = 0;
        Some(outgoing)
    }

    /// Call once per cycle (or lazily before evaluation) to pick up a day
    /// rollover. Returns the archived daily record when one occurred.
    pub fn roll_day_if_needed(&self) -> Option<DailyRiskUsage> {
        let now = self.clock.now_utc();
        let mut state = self.state.write();
        self.maybe_roll_day(&mut state, now)
    }

    pub fn update_equity(&self, equity: f64, at: DateTime<Utc>) {
        let mut state = self.state.write();
        state.equity = equity;
        state.equity_updated_at = at;
        if equity > state.peak_equity {
            state.peak_equity = equity;
        }
        self.check_drawdown_recovery(&mut state);
    }

    fn check_drawdown_recovery(&self, state: &mut TrackerState) {
        if !state.is_halted || state.requires_manual_resume {
            return;
        }
        let drawdown = Self::drawdown_pct(state.peak_equity, state.equity);
        if drawdown <= self.config.reduce_when_drawdown_pct {
            state.is_halted = false;
        }
    }

    fn drawdown_pct(peak: f64, equity: f64) -> f64 {
        if peak <= 0.0 {
            return 0.0;
        }
        ((peak - equity) / peak * 100.0).max(0.0)
    }

    /// Halt with `require_manual_resume = true` for hard stops (drawdown
    /// breach, consecutive-loss limit): auto-recovery never applies to
    /// those, only to soft, recoverable conditions.
    pub fn halt_trading(&self, require_manual_resume: bool) {
        let mut state = self.state.write();
        state.is_halted = true;
        state.requires_manual_resume = require_manual_resume;
    }

    pub fn resume_trading(&self) {
        let mut state = self.state.write();
        state.is_halted = false;
        state.requires_manual_resume = false;
    }

    pub fn register_position_opened(
        &self,
        symbol: &str,
        exchange: &str,
        direction: Direction,
        entry_price: f64,
        stop_loss: f64,
        size: f64,
        risk_pct: f64,
    ) -> OpenPositionRisk {
        let now = self.clock.now_utc();
        let mut state = self.state.write();
        let risk_amount = (entry_price - stop_loss).abs() * size;
        let position = OpenPositionRisk {
            position_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            direction,
            entry_price,
            current_stop: stop_loss,
            size,
            risk_amount,
            risk_pct,
            equity_at_entry: state.equity,
            status: PositionStatus::Open,
            opened_at: now,
            closed_at: None,
            realized_pnl: None,
        };
        state.open_used_pct += risk_pct;
        if state.open_used_pct > state.peak_open_pct {
            state.peak_open_pct = state.open_used_pct;
        }
        state.daily.consumed_pct += risk_pct;
        if state.open_used_pct > state.daily.peak_open_pct {
            state.daily.peak_open_pct = state.open_used_pct;
        }
        state.daily.trades_taken += 1;
        state.open_positions.insert(position.position_id, position.clone());
        position
    }

    /// Risk increase consumes additional daily budget; a decrease is never
    /// refunded. This is intentional: refunding on a stop-loosening would
    /// let repeated tighten/loosen cycles launder budget back into the
    /// daily pool.
    pub fn update_stop_loss(&self, position_id: Uuid, new_stop: f64) -> Option<OpenPositionRisk> {
        let mut state = self.state.write();
        let equity = state.equity;
        let position = state.open_positions.get_mut(&position_id)?;
        if (position.current_stop - new_stop).abs() < f64::EPSILON {
            return Some(position.clone());
        }
        let old_risk_pct = position.risk_pct;
        let new_risk_amount = (position.entry_price - new_stop).abs() * position.size;
        let new_risk_pct = if equity > 0.0 { new_risk_amount / equity * 100.0 } else { old_risk_pct };

        position.current_stop = new_stop;
        position.risk_amount = new_risk_amount;
        position.risk_pct = new_risk_pct;
        let updated = position.clone();

        state.open_used_pct += (new_risk_pct - old_risk_pct).max(0.0);
        if new_risk_pct > old_risk_pct {
            state.daily.consumed_pct += new_risk_pct - old_risk_pct;
        }
        Some(updated)
    }

    pub fn register_position_closed(&self, position_id: Uuid, realized_pnl: f64) -> Option<OpenPositionRisk> {
        let now = self.clock.now_utc();
        let mut state = self.state.write();
        let mut position = state.open_positions.remove(&position_id)?;
        position.status = PositionStatus::Closed;
        position.closed_at = Some(now);
        position.realized_pnl = Some(realized_pnl);

        state.open_used_pct = (state.open_used_pct - position.risk_pct).max(0.0);
        state.daily.realized_pnl += realized_pnl;
        if realized_pnl < 0.0 {
            state.consecutive_losses += 1;
        } else {
            state.consecutive_losses = 0;
        }
        Some(position)
    }

    /// Proportionally releases budget for the closed fraction; the
    /// position stays open at the remaining size.
    pub fn partial_close_position(&self, position_id: Uuid, closed_fraction: f64, realized_pnl: f64) -> Option<OpenPositionRisk> {
        let fraction = closed_fraction.clamp(0.0, 1.0);
        let mut state = self.state.write();
        let position = state.open_positions.get_mut(&position_id)?;
        let released_pct = position.risk_pct * fraction;

        position.size *= 1.0 - fraction;
        position.risk_amount *= 1.0 - fraction;
        position.risk_pct -= released_pct;
        position.status = PositionStatus::PartiallyClosed;
        let updated = position.clone();

        state.open_used_pct = (state.open_used_pct - released_pct).max(0.0);
        state.daily.realized_pnl += realized_pnl;
        Some(updated)
    }

    pub fn reject_recorded(&self) {
        self.state.write().daily.trades_rejected += 1;
    }

    pub fn get_total_open_risk_pct(&self) -> f64 {
        self.state.read().open_used_pct
    }

    pub fn get_daily_risk_used_pct(&self) -> f64 {
        self.state.read().daily.consumed_pct
    }

    pub fn get_current_drawdown_pct(&self) -> f64 {
        let state = self.state.read();
        Self::drawdown_pct(state.peak_equity, state.equity)
    }

    pub fn snapshot(&self) -> RiskBudgetSnapshot {
        let state = self.state.read();
        RiskBudgetSnapshot {
            equity: state.equity,
            peak_equity: state.peak_equity,
            current_drawdown_pct: Self::drawdown_pct(state.peak_equity, state.equity),
            open_positions: state.open_positions.values().cloned().collect(),
            open_used_pct: state.open_used_pct,
            daily: state.daily.clone(),
            consecutive_losses: state.consecutive_losses,
            is_halted: state.is_halted,
            equity_updated_at: state.equity_updated_at,
        }
    }

    pub fn has_position_for_symbol(&self, symbol: &str) -> bool {
        self.state.read().open_positions.values().any(|p| p.symbol == symbol)
    }

    pub fn config(&self) -> &RiskBudgetConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use std::sync::Arc;

    fn tracker() -> RiskTracker {
        RiskTracker::new(RiskBudgetConfig::default(), Arc::new(SystemClock::default()), 1500.0)
    }

    #[test]
    fn register_then_close_leaves_budget_unchanged_except_counters() {
        let t = tracker();
        let before = t.snapshot();
        let position = t.register_position_opened("BTCUSDT", "binance", Direction::Long, 60000.0, 59500.0, 0.01, 0.333);
        assert!(t.get_total_open_risk_pct() > 0.0);
        t.register_position_closed(position.position_id, 10.0);
        let after = t.snapshot();
        assert_eq!(after.open_used_pct, before.open_used_pct);
        assert_eq!(after.daily.realized_pnl, 10.0);
    }

    #[test]
    fn update_stop_loss_twice_with_same_value_is_a_no_op() {
        let t = tracker();
        let position = t.register_position_opened("ETHUSDT", "binance", Direction::Long, 3000.0, 2950.0, 0.1, 0.333);
        let consumed_before = t.get_daily_risk_used_pct();
        t.update_stop_loss(position.position_id, 2900.0);
        let consumed_after_first = t.get_daily_risk_used_pct();
        t.update_stop_loss(position.position_id, 2900.0);
        let consumed_after_second = t.get_daily_risk_used_pct();
        assert!(consumed_after_first >= consumed_before);
        assert_eq!(consumed_after_first, consumed_after_second);
    }

    #[test]
    fn loosening_stop_does_not_refund_daily_budget() {
        let t = tracker();
        let position = t.register_position_opened("ETHUSDT", "binance", Direction::Long, 3000.0, 2990.0, 0.1, 0.1);
        let consumed_before = t.get_daily_risk_used_pct();
        t.update_stop_loss(position.position_id, 2995.0);
        let consumed_after = t.get_daily_risk_used_pct();
        assert_eq!(consumed_after, consumed_before);
    }

    #[test]
    fn drawdown_recovery_only_when_not_manual_resume() {
        let t = tracker();
        t.halt_trading(false);
        t.update_equity(1500.0, Utc::now());
        assert!(!t.snapshot().is_halted);

        t.halt_trading(true);
        t.update_equity(1500.0, Utc::now());
        assert!(t.snapshot().is_halted);
    }

    #[test]
    fn consecutive_losses_reset_on_non_negative_pnl() {
        let t = tracker();
        for _ in 0..3 {
            let p = t.register_position_opened("BTCUSDT", "binance", Direction::Long, 100.0, 99.0, 1.0, 0.01);
            t.register_position_closed(p.position_id, -5.0);
        }
        assert_eq!(t.snapshot().consecutive_losses, 3);
        let p = t.register_position_opened("BTCUSDT", "binance", Direction::Long, 100.0, 99.0, 1.0, 0.01);
        t.register_position_closed(p.position_id, 1.0);
        assert_eq!(t.snapshot().consecutive_losses, 0);
    }
}
