//! Enforces legal `SystemState` transitions (spec §4.4).
//!
//! Escalation to any higher-severity state is always permitted. De-escalation
//! is restricted: `HALTED_SOFT -> RUNNING` is automatic once the triggering
//! issue resolves, but `HALTED_HARD`/`EMERGENCY_LOCKDOWN -> RUNNING` require
//! an explicit, acknowledged manual resume.

use super::types::{InvalidStateTransitionError, SystemState};

#[derive(Debug, Default)]
pub struct StateMachine;

impl StateMachine {
    /// Validate a transition without committing it. Callers persist the
    /// resulting `StateTransition` themselves once this returns `Ok`.
    pub fn validate(&self, from: SystemState, to: SystemState, manual_resume: bool) -> Result<(), InvalidStateTransitionError> {
        if from == to {
            return Ok(());
        }

        if to > from {
            return Ok(());
        }

        // De-escalation.
        if from.requires_manual_resume() {
            if to == SystemState::Running && manual_resume {
                return Ok(());
            }
            return Err(InvalidStateTransitionError { from, to });
        }

        match (from, to) {
            (SystemState::HaltedSoft, SystemState::Running) => Ok(()),
            (SystemState::Degraded, SystemState::Running) => Ok(()),
            _ => Err(InvalidStateTransitionError { from, to }),
        }
    }
}
