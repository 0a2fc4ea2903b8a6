//! Orchestrator (spec §4.1): the top-level process loop. Owns the module
//! registry, the execution pipeline, and a handle to the System Risk
//! Controller; drives cycles until told to stop or until the controller's
//! authority forces a stop.
//!
//! Grounded on `original_source/orchestrator/core.py` for the lifecycle
//! shape (bootstrap → loop → graceful shutdown) — the Python body was
//! stripped to a docstring, so the cycle loop and signal handling below
//! are fresh, written against this crate's own `state_store`/`clock`
//! idioms and spec.md §4.1's explicit SIGINT/SIGTERM requirement.

pub mod models;
pub mod pipeline;
pub mod registry;

pub use models::{CycleOutcome, CycleResult, ExecutionStage, RuntimeMode, StageResult, StageStatus};
pub use pipeline::{ExecutionPipeline, PipelineBuilder, StageHandler};
pub use registry::{ModuleDefinition, ModuleRegistry};

use crate::clock::Clock;
use crate::src_control::{SystemRiskController, SystemState};
use crate::state_store::{OrchestratorStateFile, StateFile};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct OrchestratorConfig {
    pub mode: RuntimeMode,
    pub cycle_interval: Duration,
    /// Grace period after the first shutdown signal before the second
    /// signal (or a missed grace window) forces an immediate stop.
    pub shutdown_grace: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::Full,
            cycle_interval: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: ModuleRegistry,
    pipeline: ExecutionPipeline,
    src: Arc<SystemRiskController>,
    clock: Arc<dyn Clock>,
    state_file: StateFile,
    stopping: AtomicBool,
}

/// Process exit codes (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Clean = 0,
    ConfigurationError = 1,
    StartupFailure = 2,
    EmergencyStop = 3,
    UnhandledPanic = 4,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: ModuleRegistry,
        pipeline: ExecutionPipeline,
        src: Arc<SystemRiskController>,
        clock: Arc<dyn Clock>,
        state_dir: impl AsRef<std::path::Path>,
    ) -> Self {
        Self {
            config,
            registry,
            pipeline,
            src,
            clock,
            state_file: StateFile::new(state_dir, "orchestrator_state.json"),
            stopping: AtomicBool::new(false),
        }
    }

    fn persist_cycle(&self, cycle: &CycleResult) {
        let state = OrchestratorStateFile {
            current_mode: format!("{:?}", self.config.mode),
            last_cycle_id: Some(cycle.cycle_id.to_string()),
            last_cycle_ts: Some(cycle.end_ts),
            shutdown_clean: false,
        };
        if let Err(e) = self.state_file.write(&state) {
            warn!(error = %e, "failed to persist orchestrator state");
        }
    }

    fn persist_clean_shutdown(&self) {
        let state = OrchestratorStateFile {
            current_mode: format!("{:?}", self.config.mode),
            last_cycle_id: None,
            last_cycle_ts: Some(self.clock.now_utc()),
            shutdown_clean: true,
        };
        if let Err(e) = self.state_file.write(&state) {
            warn!(error = %e, "failed to persist clean-shutdown marker");
        }
    }

    /// Runs cycles until a shutdown signal arrives or the controller
    /// forces one via [`SystemState::HaltedHard`]. Returns the process
    /// exit code to use.
    pub async fn run(&self) -> ExitCode {
        if let Err(e) = self.registry.start_all().await {
            warn!(error = %e, "module startup failed");
            return ExitCode::StartupFailure;
        }

        let shutdown = Self::shutdown_signal();
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.config.cycle_interval);

        let exit_code = loop {
            if self.stopping.load(Ordering::SeqCst) {
                break ExitCode::Clean;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    if !self.src.can_trade() && self.src.state() == SystemState::HaltedHard {
                        warn!("system risk controller halted hard, stopping orchestration");
                        break ExitCode::EmergencyStop;
                    }

                    let (cycle, outcome) = self.pipeline.run_cycle(self.config.mode).await;
                    metrics::counter!("control_plane_cycles_total").increment(1);
                    self.persist_cycle(&cycle);

                    match outcome {
                        CycleOutcome::Continue => {}
                        CycleOutcome::StopLifecycle => {
                            warn!("cycle reported a non-recoverable failure, stopping");
                            break ExitCode::StartupFailure;
                        }
                        CycleOutcome::EmergencyStop => {
                            warn!("cycle requested emergency stop");
                            break ExitCode::EmergencyStop;
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("shutdown signal received, draining current cycle");
                    break ExitCode::Clean;
                }
            }
        };

        self.shutdown(exit_code).await
    }

    async fn shutdown(&self, exit_code: ExitCode) -> ExitCode {
        self.stopping.store(true, Ordering::SeqCst);
        let grace = self.config.shutdown_grace;

        match tokio::time::timeout(grace, self.registry.stop_all()).await {
            Ok(()) => {
                if exit_code == ExitCode::Clean {
                    self.persist_clean_shutdown();
                }
            }
            Err(_) => {
                warn!(?grace, "module shutdown exceeded grace period, forcing exit");
            }
        }
        exit_code
    }

    /// Resolves on SIGINT or SIGTERM (Unix) / Ctrl-C (elsewhere). A second
    /// signal while already shutting down is handled by `run()`'s loop
    /// exiting on the next `stopping` check rather than by this future,
    /// which only ever fires once.
    #[cfg(unix)]
    async fn shutdown_signal() {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }

    #[cfg(not(unix))]
    async fn shutdown_signal() {
        let _ = tokio::signal::ctrl_c().await;
    }
}
