//! The five System Risk Controller monitors (spec §4.4).
//!
//! Each monitor is a thin async wrapper (to satisfy `src_control::engine::
//! Monitor`) around a pure `assess(config, snapshot) -> MonitorResult`
//! function, grounded on `original_source/system_risk_controller/monitors/
//! base.py`'s stated contract: fast, stateless, deterministic, fail-safe.

pub mod control;
pub mod data_integrity;
pub mod execution;
pub mod infrastructure;
pub mod processing;

pub use crate::src_control::engine::Monitor;
pub use control::ControlMonitor;
pub use data_integrity::DataIntegrityMonitor;
pub use execution::ExecutionMonitor;
pub use infrastructure::InfrastructureMonitor;
pub use processing::ProcessingMonitor;

/// Supplies a monitor with its input snapshot. `None` means the snapshot
/// could not be obtained at all (ingestion not yet warm, provider down);
/// every monitor treats that as fail-safe critical, never as healthy.
pub trait SnapshotProvider<T>: Send + Sync {
    fn snapshot(&self) -> Option<T>;
}

/// A provider that always hands back a clone of a fixed value. Real
/// ingestion wiring is out of scope here; this is what a deployment
/// without its own live feed falls back to.
pub struct StaticSnapshotProvider<T: Clone + Send + Sync>(pub T);

impl<T: Clone + Send + Sync> SnapshotProvider<T> for StaticSnapshotProvider<T> {
    fn snapshot(&self) -> Option<T> {
        Some(self.0.clone())
    }
}
