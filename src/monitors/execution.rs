//! Execution health monitor (spec §4.4).
//!
//! Grounded on `original_source/system_risk_controller/monitors/execution.py`'s
//! trigger catalogue.

use super::SnapshotProvider;
use crate::src_control::types::{HaltLevel, HaltTrigger, MonitorResult, TriggerCategory};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct ExecutionSnapshot {
    pub rejections_in_window: u32,
    pub max_slippage_bps_in_window: f64,
    pub exchange_position: Option<f64>,
    pub tracker_position: Option<f64>,
    pub unconfirmed_orders: u32,
    pub exchange_errors_in_window: u32,
    pub oldest_pending_order_age_secs: i64,
}

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub rejection_burst_threshold: u32,
    pub max_slippage_bps: f64,
    pub position_mismatch_tolerance: f64,
    pub unconfirmed_order_threshold: u32,
    pub exchange_error_threshold: u32,
    pub order_stuck_secs: i64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            rejection_burst_threshold: 3,
            max_slippage_bps: 50.0,
            position_mismatch_tolerance: 1e-6,
            unconfirmed_order_threshold: 2,
            exchange_error_threshold: 3,
            order_stuck_secs: 60,
        }
    }
}

fn trigger(name: &str, reason: impl Into<String>) -> HaltTrigger {
    HaltTrigger::new(TriggerCategory::Execution, name, reason)
}

pub fn assess(config: &ExecutionConfig, snapshot: &ExecutionSnapshot) -> MonitorResult {
    if snapshot.rejections_in_window >= config.rejection_burst_threshold {
        return MonitorResult::halt(
            trigger("REPEATED_REJECTIONS", format!("{} rejections in window", snapshot.rejections_in_window)),
            HaltLevel::Hard,
            "order rejection burst",
        );
    }

    if snapshot.max_slippage_bps_in_window > config.max_slippage_bps {
        return MonitorResult::halt(
            trigger(
                "SLIPPAGE_EXCEEDED",
                format!("{:.1}bps exceeds {:.1}bps cap", snapshot.max_slippage_bps_in_window, config.max_slippage_bps),
            ),
            HaltLevel::Hard,
            "slippage beyond cap",
        );
    }

    if let (Some(exch), Some(tracked)) = (snapshot.exchange_position, snapshot.tracker_position) {
        if (exch - tracked).abs() > config.position_mismatch_tolerance {
            return MonitorResult::halt(
                trigger("POSITION_MISMATCH", format!("exchange={exch} tracker={tracked}")),
                HaltLevel::Hard,
                "exchange position diverged from tracker",
            );
        }
    }

    if snapshot.unconfirmed_orders >= config.unconfirmed_order_threshold {
        return MonitorResult::halt(
            trigger("UNCONFIRMED_EXECUTION", format!("{} unconfirmed orders", snapshot.unconfirmed_orders)),
            HaltLevel::Soft,
            "unconfirmed order count above threshold",
        );
    }

    if snapshot.exchange_errors_in_window >= config.exchange_error_threshold {
        return MonitorResult::halt(
            trigger("EXCHANGE_ERROR", format!("{} exchange errors in window", snapshot.exchange_errors_in_window)),
            HaltLevel::Soft,
            "exchange API error burst",
        );
    }

    if snapshot.oldest_pending_order_age_secs > config.order_stuck_secs {
        return MonitorResult::halt(
            trigger("ORDER_STUCK", format!("pending order age {}s", snapshot.oldest_pending_order_age_secs)),
            HaltLevel::Soft,
            "order stuck pending beyond threshold",
        );
    }

    MonitorResult::healthy("execution nominal")
}

pub struct ExecutionMonitor {
    config: ExecutionConfig,
    provider: Box<dyn SnapshotProvider<ExecutionSnapshot>>,
}

impl ExecutionMonitor {
    pub fn new(config: ExecutionConfig, provider: Box<dyn SnapshotProvider<ExecutionSnapshot>>) -> Self {
        Self { config, provider }
    }
}

#[async_trait]
impl super::Monitor for ExecutionMonitor {
    fn name(&self) -> &str {
        "execution"
    }

    async fn evaluate(&self) -> MonitorResult {
        match self.provider.snapshot() {
            Some(snapshot) => assess(&self.config, &snapshot),
            None => MonitorResult::halt(
                trigger("EXCHANGE_ERROR", "snapshot provider unavailable"),
                HaltLevel::Hard,
                "could not obtain execution snapshot",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> ExecutionSnapshot {
        ExecutionSnapshot {
            rejections_in_window: 0,
            max_slippage_bps_in_window: 5.0,
            exchange_position: Some(1.0),
            tracker_position: Some(1.0),
            unconfirmed_orders: 0,
            exchange_errors_in_window: 0,
            oldest_pending_order_age_secs: 0,
        }
    }

    #[test]
    fn nominal_is_healthy() {
        assert!(assess(&ExecutionConfig::default(), &baseline()).healthy);
    }

    #[test]
    fn position_mismatch_halts_hard() {
        let mut snapshot = baseline();
        snapshot.exchange_position = Some(1.5);
        let result = assess(&ExecutionConfig::default(), &snapshot);
        assert_eq!(result.halt_trigger.unwrap().code, "EX_POSITION_MISMATCH");
        assert_eq!(result.halt_level, Some(HaltLevel::Hard));
    }

    #[test]
    fn rejection_burst_halts_hard() {
        let mut snapshot = baseline();
        snapshot.rejections_in_window = 5;
        let result = assess(&ExecutionConfig::default(), &snapshot);
        assert_eq!(result.halt_trigger.unwrap().code, "EX_REPEATED_REJECTIONS");
    }

    #[test]
    fn order_stuck_halts_soft() {
        let mut snapshot = baseline();
        snapshot.oldest_pending_order_age_secs = 120;
        let result = assess(&ExecutionConfig::default(), &snapshot);
        assert_eq!(result.halt_level, Some(HaltLevel::Soft));
    }
}
