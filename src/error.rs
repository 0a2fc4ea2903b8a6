//! Central error taxonomy for the control plane.
//!
//! Mirrors the kinds enumerated in the platform's error-handling design: every
//! subsystem converts its local failures into one of these variants at its
//! boundary. Only [`CoreError::Configuration`] is permitted to terminate the
//! process (at bootstrap); every other variant is caught and converted into a
//! structured decision (REJECT, CRITICAL, HALT, ...) by its caller.

use thiserror::Error;

/// Aggregate error type for the control plane.
///
/// Individual subsystems define their own narrower error enums (see
/// `risk_budget::types::RiskBudgetError`, `src_control::types::ControlError`)
/// and convert into this one only when crossing into the orchestrator.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid or missing configuration. The only kind allowed to crash the
    /// process, and only during bootstrap.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Ill-formed request from a caller. Never halts anything; callers
    /// convert this into a REJECT decision with `INVALID_PARAMETERS`.
    #[error("validation error: {0}")]
    Validation(String),

    /// Equity or market data older than its configured staleness bound.
    #[error("data staleness error: {0}")]
    Staleness(String),

    /// A persistence write failed. Bounded-retry then escalate; never loop
    /// indefinitely.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// A notification/alert transport failed. Logged and swallowed; must
    /// never block the control path.
    #[error("transport error: {0}")]
    Transport(String),

    /// An internal invariant was violated (state corruption, illegal
    /// transition attempted by code rather than by an operator).
    #[error("internal invariant violated: {0}")]
    Internal(String),

    /// A cooperative operation exceeded its configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Errors raised by the append-only persistence log and atomic state files.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("atomic rename failed for {path}: {source}")]
    Rename {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Classification of a failure for the orchestrator's stage-retry logic.
///
/// Recoverable failures are retried on the next cycle; non-recoverable
/// failures stop the orchestration lifecycle. This is a property of the
/// *situation*, not of the error type alone, which is why it is a free
/// function rather than a method on [`CoreError`] — a stage decides how to
/// classify the errors it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Recoverable,
    NonRecoverable,
    /// Escalate immediately to SRC EMERGENCY_LOCKDOWN.
    EmergencyStop,
}

/// Default classification used when a stage does not override it.
///
/// Unknown errors are treated as recoverable with bounded backoff, per the
/// orchestrator's failure semantics.
pub fn classify_default(err: &CoreError) -> FailureClass {
    match err {
        CoreError::Configuration(_) => FailureClass::NonRecoverable,
        CoreError::Internal(_) => FailureClass::NonRecoverable,
        CoreError::Persistence(_) => FailureClass::NonRecoverable,
        CoreError::Staleness(_) => FailureClass::Recoverable,
        CoreError::Validation(_) => FailureClass::Recoverable,
        CoreError::Transport(_) => FailureClass::Recoverable,
        CoreError::Timeout(_) => FailureClass::Recoverable,
    }
}
