//! System Risk Controller (spec §4.4): absolute halt authority. Owns the
//! only legal path for `SystemState` transitions; every other subsystem
//! consults `can_trade()` but none may override it.

pub mod engine;
pub mod state_machine;
pub mod types;

pub use engine::{Monitor, SystemRiskController};
pub use state_machine::StateMachine;
pub use types::{
    HaltEvent, HaltLevel, HaltTrigger, InvalidStateTransitionError, MonitorResult, ResumeNotAllowedError,
    ResumeRequest, StateTransition, SystemState, TriggerCategory,
};
