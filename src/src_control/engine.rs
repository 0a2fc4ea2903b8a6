//! System Risk Controller: absolute halt authority (spec §4.4).
//!
//! Runs every registered monitor on its own interval, coalesces results to
//! the most severe one per tick, and owns the only path that may transition
//! `SystemState`. Nothing else in the system may issue orders when
//! `can_trade()` is false.

use super::state_machine::StateMachine;
use super::types::{
    HaltEvent, HaltLevel, HaltTrigger, InvalidStateTransitionError, MonitorResult, ResumeNotAllowedError,
    ResumeRequest, StateTransition, SystemState, TriggerCategory,
};
use crate::alerting::{Alert, AlertSeverity, AlertingService};
use crate::clock::Clock;
use crate::persistence::{HaltEventRow, PersistenceLog};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Serializes an enum through its serde representation and strips the
/// surrounding quotes, so `SystemState::HaltedHard` becomes `"HALTED_HARD"`.
fn enum_code<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// A single category-specific health check, evaluated over an immutable
/// snapshot. Implementations must be pure and side-effect free (spec §9
/// design note: capability set behind a single interface).
#[async_trait]
pub trait Monitor: Send + Sync {
    fn name(&self) -> &str;
    async fn evaluate(&self) -> MonitorResult;
}

const MONITOR_TIMEOUT: Duration = Duration::from_secs(10);

fn severity_rank(level: HaltLevel) -> u8 {
    match level {
        HaltLevel::Soft => 1,
        HaltLevel::Hard => 2,
        HaltLevel::Emergency => 3,
    }
}

pub struct SystemRiskController {
    state: RwLock<SystemState>,
    requires_manual_resume: AtomicBool,
    state_machine: StateMachine,
    monitors: Vec<Arc<dyn Monitor>>,
    clock: Arc<dyn Clock>,
    persistence: Arc<PersistenceLog>,
    alerting: Arc<AlertingService>,
    last_halt_event_id: Mutex<Option<Uuid>>,
}

impl SystemRiskController {
    pub fn new(
        monitors: Vec<Arc<dyn Monitor>>,
        clock: Arc<dyn Clock>,
        persistence: Arc<PersistenceLog>,
        alerting: Arc<AlertingService>,
    ) -> Self {
        Self {
            state: RwLock::new(SystemState::Running),
            requires_manual_resume: AtomicBool::new(false),
            state_machine: StateMachine::default(),
            monitors,
            clock,
            persistence,
            alerting,
            last_halt_event_id: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SystemState {
        *self.state.read()
    }

    pub fn can_trade(&self) -> bool {
        self.state().can_trade()
    }

    /// Run every registered monitor concurrently, each bounded by the
    /// 10-second timeout; a monitor that exceeds it is treated as a
    /// synthetic CRITICAL/INTERNAL halt rather than hung forever.
    pub async fn run_tick(&self) {
        let mut handles = Vec::with_capacity(self.monitors.len());
        for monitor in &self.monitors {
            let monitor = monitor.clone();
            handles.push(async move {
                match tokio::time::timeout(MONITOR_TIMEOUT, monitor.evaluate()).await {
                    Ok(result) => result,
                    Err(_) => MonitorResult::halt(
                        HaltTrigger::new(TriggerCategory::Internal, "MONITOR_TIMEOUT", format!("{} exceeded 10s", monitor.name())),
                        HaltLevel::Hard,
                        "monitor timed out",
                    ),
                }
            });
        }

        let results: Vec<MonitorResult> = futures_util::future::join_all(handles).await;
        if let Some(worst) = results
            .into_iter()
            .filter(|r| !r.healthy)
            .max_by_key(|r| r.severity().map(severity_rank).unwrap_or(0))
        {
            if let (Some(trigger), Some(level)) = (worst.halt_trigger.clone(), worst.halt_level) {
                self.apply_halt(trigger, level, None);
            }
        }
    }

    /// Operator/programmatic entry point for an out-of-band halt request.
    pub fn request_halt(
        &self,
        trigger: HaltTrigger,
        level: HaltLevel,
        operator: Option<&str>,
    ) -> Result<StateTransition, InvalidStateTransitionError> {
        let reason = operator
            .map(|op| format!("{} (requested by {op})", trigger.reason))
            .unwrap_or_else(|| trigger.reason.clone());
        let mut trigger = trigger;
        trigger.reason = reason;
        self.apply_halt(trigger, level, None)
            .ok_or(InvalidStateTransitionError {
                from: self.state(),
                to: level.target_state(),
            })
    }

    fn apply_halt(&self, trigger: HaltTrigger, level: HaltLevel, monitor_id: Option<String>) -> Option<StateTransition> {
        let current = self.state();
        let target = level.target_state();
        let next = if target > current { target } else { current };

        if self.state_machine.validate(current, next, false).is_err() {
            return None;
        }

        let now = self.clock.now_utc();
        let manual_resume_needed = next.requires_manual_resume();
        let correlation_id = Uuid::new_v4();
        let halt_event = HaltEvent {
            id: Uuid::new_v4(),
            trigger: trigger.clone(),
            level,
            reason: trigger.reason.clone(),
            category: trigger.category,
            timestamp: now,
            monitor_id,
            snapshot: format!("{current:?}->{next:?}"),
            correlation_id,
        };

        let row = HaltEventRow {
            id: halt_event.id.to_string(),
            trigger: halt_event.trigger.code.clone(),
            level: enum_code(&halt_event.level),
            category: enum_code(&halt_event.category),
            reason: halt_event.reason.clone(),
            monitor_id: halt_event.monitor_id.clone(),
            correlation_id: Some(halt_event.correlation_id.to_string()),
            snapshot_json: halt_event.snapshot.clone(),
            ts: halt_event.timestamp,
        };

        let (committed_next, committed_event) = match self.persistence.append_halt_event(&row) {
            Ok(()) => (next, halt_event),
            Err(e) => {
                error!(error = %e, "failed to persist halt event; escalating to HALTED_HARD");
                let escalated_trigger = HaltTrigger::new(
                    TriggerCategory::Internal,
                    "PERSISTENCE_FAILURE",
                    "halt event persistence failed",
                );
                let escalated_event = HaltEvent {
                    id: Uuid::new_v4(),
                    trigger: escalated_trigger.clone(),
                    level: HaltLevel::Hard,
                    reason: escalated_trigger.reason.clone(),
                    category: TriggerCategory::Internal,
                    timestamp: now,
                    monitor_id: None,
                    snapshot: format!("{current:?}->HALTED_HARD (escalated)"),
                    correlation_id,
                };
                let escalated_row = HaltEventRow {
                    id: escalated_event.id.to_string(),
                    trigger: escalated_event.trigger.code.clone(),
                    level: enum_code(&escalated_event.level),
                    category: enum_code(&escalated_event.category),
                    reason: escalated_event.reason.clone(),
                    monitor_id: None,
                    correlation_id: Some(escalated_event.correlation_id.to_string()),
                    snapshot_json: escalated_event.snapshot.clone(),
                    ts: escalated_event.timestamp,
                };
                let _ = self.persistence.append_halt_event(&escalated_row);
                (SystemState::HaltedHard, escalated_event)
            }
        };

        *self.state.write() = committed_next;
        self.requires_manual_resume
            .store(committed_next.requires_manual_resume() || manual_resume_needed, Ordering::SeqCst);
        *self.last_halt_event_id.lock() = Some(committed_event.id);

        let trigger_json = serde_json::to_string(&committed_event.trigger).ok();
        let transition_id = self
            .persistence
            .append_state_transition(
                &enum_code(&current),
                &enum_code(&committed_next),
                trigger_json.as_deref(),
                now,
            )
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to persist state transition");
                0
            });
        let transition = StateTransition {
            id: transition_id,
            from: current,
            to: committed_next,
            trigger: Some(committed_event.trigger.clone()),
            ts: now,
        };

        let severity = match committed_next {
            SystemState::EmergencyLockdown => AlertSeverity::Emergency,
            SystemState::HaltedHard => AlertSeverity::Critical,
            _ => AlertSeverity::Warning,
        };
        self.alerting.emit(
            &format!("{}:{}", committed_event.trigger.code, committed_event.trigger.category.prefix()),
            Alert {
                severity,
                title: format!("system halt: {:?}", committed_next),
                message: committed_event.reason.clone(),
            },
        );

        info!(from = ?current, to = ?committed_next, trigger = %committed_event.trigger.code, "system state transition");
        Some(transition)
    }

    /// Automatic recovery path: called once an issue clears. Only valid
    /// when the current state does not require manual resume.
    pub fn auto_resume(&self) -> Result<StateTransition, InvalidStateTransitionError> {
        let current = self.state();
        if current.requires_manual_resume() {
            return Err(InvalidStateTransitionError {
                from: current,
                to: SystemState::Running,
            });
        }
        self.state_machine.validate(current, SystemState::Running, false)?;
        let now = self.clock.now_utc();
        *self.state.write() = SystemState::Running;
        let transition_id = self
            .persistence
            .append_state_transition(&enum_code(&current), &enum_code(&SystemState::Running), None, now)
            .unwrap_or(0);
        let transition = StateTransition {
            id: transition_id,
            from: current,
            to: SystemState::Running,
            trigger: None,
            ts: now,
        };
        Ok(transition)
    }

    pub fn request_resume(&self, request: ResumeRequest) -> Result<StateTransition, ResumeNotAllowedError> {
        let current = self.state();
        if !current.requires_manual_resume() {
            return Err(ResumeNotAllowedError(format!(
                "{current:?} does not require manual resume"
            )));
        }
        if !request.acknowledged {
            return Err(ResumeNotAllowedError("resume request was not acknowledged".into()));
        }

        self.state_machine
            .validate(current, SystemState::Running, true)
            .map_err(|e| ResumeNotAllowedError(e.to_string()))?;

        let now = self.clock.now_utc();
        *self.state.write() = SystemState::Running;
        self.requires_manual_resume.store(false, Ordering::SeqCst);
        let transition_id = self
            .persistence
            .append_state_transition(&enum_code(&current), &enum_code(&SystemState::Running), None, now)
            .unwrap_or(0);
        let transition = StateTransition {
            id: transition_id,
            from: current,
            to: SystemState::Running,
            trigger: None,
            ts: now,
        };
        if let Err(e) = self
            .persistence
            .append_resume_request(&request.operator, &request.reason, request.acknowledged, true, None, now)
        {
            warn!(error = %e, "failed to persist resume request");
        }
        info!(operator = %request.operator, "manual resume granted");
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::NullAlertSender;
    use crate::clock::SystemClock;

    fn controller(monitors: Vec<Arc<dyn Monitor>>) -> SystemRiskController {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let persistence = Arc::new(PersistenceLog::open_in_memory().unwrap());
        let alerting = Arc::new(AlertingService::new(Box::new(NullAlertSender), Duration::from_secs(60)));
        SystemRiskController::new(monitors, clock, persistence, alerting)
    }

    struct HaltingMonitor;
    #[async_trait]
    impl Monitor for HaltingMonitor {
        fn name(&self) -> &str {
            "halting"
        }
        async fn evaluate(&self) -> MonitorResult {
            MonitorResult::halt(
                HaltTrigger::new(TriggerCategory::Execution, "POSITION_MISMATCH", "exchange position diverged"),
                HaltLevel::Hard,
                "mismatch detected",
            )
        }
    }

    #[tokio::test]
    async fn halting_monitor_drives_state_to_halted_hard_and_blocks_trading() {
        let controller = controller(vec![Arc::new(HaltingMonitor)]);
        assert!(controller.can_trade());
        controller.run_tick().await;
        assert_eq!(controller.state(), SystemState::HaltedHard);
        assert!(!controller.can_trade());
    }

    #[tokio::test]
    async fn automatic_resume_is_rejected_until_acknowledged_request() {
        let controller = controller(vec![Arc::new(HaltingMonitor)]);
        controller.run_tick().await;
        assert!(controller.auto_resume().is_err());
        assert!(controller
            .request_resume(ResumeRequest {
                operator: "alice".into(),
                reason: "confirmed exchange position reconciled".into(),
                acknowledged: false,
            })
            .is_err());
        let resumed = controller.request_resume(ResumeRequest {
            operator: "alice".into(),
            reason: "confirmed exchange position reconciled".into(),
            acknowledged: true,
        });
        assert!(resumed.is_ok());
        assert_eq!(controller.state(), SystemState::Running);
    }

    struct HealthyMonitor;
    #[async_trait]
    impl Monitor for HealthyMonitor {
        fn name(&self) -> &str {
            "healthy"
        }
        async fn evaluate(&self) -> MonitorResult {
            MonitorResult::healthy("nominal")
        }
    }

    #[tokio::test]
    async fn all_healthy_monitors_leave_state_running() {
        let controller = controller(vec![Arc::new(HealthyMonitor), Arc::new(HealthyMonitor)]);
        controller.run_tick().await;
        assert_eq!(controller.state(), SystemState::Running);
    }
}
