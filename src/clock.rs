//! Unified, testable clock abstraction.
//!
//! All time-related reads in the control plane go through a `Clock` so that
//! replay/backtest runs can freeze or advance time deterministically. Grounded
//! on `original_source/core/clock.py`: a single source of truth for "now",
//! mockable, UTC-only.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;

/// Source of wall-clock and monotonic time for the whole process.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current wall-clock time (UTC). Used for timestamps that are
    /// persisted or compared against external data.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Monotonic instant, unaffected by wall-clock adjustments. Used for
    /// measuring durations (stage timing, monitor timeouts).
    fn monotonic(&self) -> Instant;
}

/// Real wall-clock/monotonic time, used in production.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that can be frozen and advanced under test or replay control.
///
/// The monotonic component is approximated by tracking elapsed offset from a
/// fixed `Instant` origin, since `Instant` itself cannot be constructed from
/// an arbitrary value.
#[derive(Debug)]
pub struct ReplayClock {
    origin_instant: Instant,
    state: RwLock<ReplayState>,
}

#[derive(Debug)]
struct ReplayState {
    wall: DateTime<Utc>,
    monotonic_offset: std::time::Duration,
}

impl ReplayClock {
    pub fn new(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            origin_instant: Instant::now(),
            state: RwLock::new(ReplayState {
                wall: start,
                monotonic_offset: std::time::Duration::ZERO,
            }),
        })
    }

    /// Advance both the wall and monotonic components by `delta`.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut state = self.state.write();
        state.wall += delta;
        if let Ok(std_delta) = delta.to_std() {
            state.monotonic_offset += std_delta;
        }
    }

    /// Jump the wall clock to an absolute timestamp (monotonic component is
    /// left untouched — replay feeds may reorder wall time but never
    /// monotonic time).
    pub fn set_wall(&self, at: DateTime<Utc>) {
        self.state.write().wall = at;
    }
}

impl Clock for ReplayClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.state.read().wall
    }

    fn monotonic(&self) -> Instant {
        self.origin_instant + self.state.read().monotonic_offset
    }
}

/// Constructs the clock implementation selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    System,
    /// Frozen at a fixed point, used by backtests and deterministic tests.
    Frozen,
}

pub fn build_clock(mode: ClockMode, frozen_at: Option<DateTime<Utc>>) -> Arc<dyn Clock> {
    match mode {
        ClockMode::System => Arc::new(SystemClock),
        ClockMode::Frozen => ReplayClock::new(frozen_at.unwrap_or_else(Utc::now)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_clock_advances_wall_and_monotonic_together() {
        let start = "2026-01-01T00:00:00Z".parse().unwrap();
        let clock = ReplayClock::new(start);
        let t0 = clock.monotonic();
        clock.advance(chrono::Duration::seconds(5));
        assert_eq!(clock.now_utc(), start + chrono::Duration::seconds(5));
        assert!(clock.monotonic() >= t0 + std::time::Duration::from_secs(5));
    }

    #[test]
    fn set_wall_does_not_move_monotonic() {
        let start = "2026-01-01T00:00:00Z".parse().unwrap();
        let clock = ReplayClock::new(start);
        let before = clock.monotonic();
        clock.set_wall(start + chrono::Duration::hours(1));
        assert_eq!(clock.monotonic(), before);
    }
}
