//! Execution pipeline (spec §4.1): runs a runtime mode's declared stages
//! in order, once per cycle, with a per-stage timeout. A stage failure
//! stops the cycle immediately — the pipeline never retries mid-cycle,
//! it classifies the failure and lets the orchestrator decide whether the
//! lifecycle continues to the next cycle or stops altogether.
//!
//! Grounded on `original_source/orchestrator/pipeline.py` for the naming
//! (`ExecutionPipeline`, `PipelineBuilder`, `StageHandler`) — the Python
//! body was stripped, so the control flow is fresh, modeled on this
//! crate's own `SystemRiskController::evaluate_once` concurrent-then-
//! sequential-apply shape from `src_control::engine`.

use super::models::{CycleOutcome, CycleResult, ExecutionStage, RuntimeMode, StageResult, StageStatus};
use crate::error::{classify_default, CoreError, FailureClass};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// A single stage's unit of work. Implementations are the orchestrator's
/// glue to the real subsystems (ingestion, risk scoring, strategy,
/// execution, monitoring) — this trait only shapes the pipeline's control
/// flow, it says nothing about what a stage actually does.
#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn run(&self) -> Result<(), CoreError>;

    /// Override when a stage's failures should be classified differently
    /// from [`classify_default`] (e.g. the risk-score stage always treats
    /// its own failure as [`FailureClass::EmergencyStop`]).
    fn classify(&self, err: &CoreError) -> FailureClass {
        classify_default(err)
    }
}

pub struct ExecutionPipeline {
    stage_timeout: Duration,
    handlers: HashMap<ExecutionStage, Box<dyn StageHandler>>,
}

impl ExecutionPipeline {
    pub fn new(stage_timeout: Duration) -> Self {
        Self { stage_timeout, handlers: HashMap::new() }
    }

    pub fn register(&mut self, stage: ExecutionStage, handler: Box<dyn StageHandler>) {
        self.handlers.insert(stage, handler);
    }

    /// Runs `mode`'s declared stages in order. Stops at the first failing
    /// stage; stages after it are not attempted.
    pub async fn run_cycle(&self, mode: RuntimeMode) -> (CycleResult, CycleOutcome) {
        let cycle_id = Uuid::new_v4();
        let start_ts = Utc::now();
        let mut stages = Vec::new();
        let mut outcome = CycleOutcome::Continue;

        for &stage in mode.stages() {
            let Some(handler) = self.handlers.get(&stage) else {
                warn!(?stage, "no handler registered for stage, skipping");
                continue;
            };

            let began = Instant::now();
            let result = tokio::time::timeout(self.stage_timeout, handler.run()).await;
            let duration = began.elapsed();

            let stage_result = match result {
                Ok(Ok(())) => StageResult { stage, status: StageStatus::Success, duration, error: None },
                Ok(Err(e)) => {
                    let class = handler.classify(&e);
                    error!(?stage, error = %e, ?class, "stage failed");
                    metrics::counter!("control_plane_stage_failures_total", "stage" => format!("{stage:?}")).increment(1);
                    outcome = match class {
                        FailureClass::Recoverable => CycleOutcome::Continue,
                        FailureClass::NonRecoverable => CycleOutcome::StopLifecycle,
                        FailureClass::EmergencyStop => CycleOutcome::EmergencyStop,
                    };
                    let r = StageResult { stage, status: StageStatus::Failed, duration, error: Some(e.to_string()) };
                    stages.push(r);
                    break;
                }
                Err(_elapsed) => {
                    error!(?stage, timeout = ?self.stage_timeout, "stage timed out");
                    outcome = CycleOutcome::Continue;
                    let r = StageResult {
                        stage,
                        status: StageStatus::TimedOut,
                        duration,
                        error: Some(format!("stage exceeded {:?} timeout", self.stage_timeout)),
                    };
                    stages.push(r);
                    break;
                }
            };
            stages.push(stage_result);
        }

        let cycle = CycleResult { cycle_id, mode, stages, start_ts, end_ts: Utc::now() };
        if cycle.all_succeeded() {
            info!(%cycle_id, ?mode, "cycle completed");
        }
        (cycle, outcome)
    }
}

/// Fluent construction helper, mirroring the teacher's builder-style
/// config assembly elsewhere in the crate.
#[derive(Default)]
pub struct PipelineBuilder {
    stage_timeout: Option<Duration>,
    handlers: Vec<(ExecutionStage, Box<dyn StageHandler>)>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    pub fn with_stage(mut self, stage: ExecutionStage, handler: Box<dyn StageHandler>) -> Self {
        self.handlers.push((stage, handler));
        self
    }

    pub fn build(self) -> ExecutionPipeline {
        let mut pipeline = ExecutionPipeline::new(self.stage_timeout.unwrap_or(Duration::from_secs(10)));
        for (stage, handler) in self.handlers {
            pipeline.register(stage, handler);
        }
        pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OkStage;
    #[async_trait]
    impl StageHandler for OkStage {
        async fn run(&self) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct FailStage;
    #[async_trait]
    impl StageHandler for FailStage {
        async fn run(&self) -> Result<(), CoreError> {
            Err(CoreError::Internal("boom".into()))
        }
    }

    struct SlowStage;
    #[async_trait]
    impl StageHandler for SlowStage {
        async fn run(&self) -> Result<(), CoreError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn full_success_runs_every_stage() {
        let pipeline = PipelineBuilder::new()
            .with_stage(ExecutionStage::Ingest, Box::new(OkStage))
            .with_stage(ExecutionStage::Process, Box::new(OkStage))
            .build();
        let (cycle, outcome) = pipeline.run_cycle(RuntimeMode::Process).await;
        assert!(cycle.all_succeeded());
        assert_eq!(outcome, CycleOutcome::Continue);
        assert_eq!(cycle.stages.len(), 2);
    }

    #[tokio::test]
    async fn failure_stops_remaining_stages() {
        let pipeline = PipelineBuilder::new()
            .with_stage(ExecutionStage::Ingest, Box::new(FailStage))
            .with_stage(ExecutionStage::Process, Box::new(OkStage))
            .build();
        let (cycle, outcome) = pipeline.run_cycle(RuntimeMode::Process).await;
        assert_eq!(cycle.stages.len(), 1);
        assert_eq!(cycle.stages[0].status, StageStatus::Failed);
        assert_eq!(outcome, CycleOutcome::StopLifecycle);
    }

    #[tokio::test]
    async fn stage_timeout_is_recorded() {
        let pipeline = PipelineBuilder::new()
            .stage_timeout(Duration::from_millis(20))
            .with_stage(ExecutionStage::Ingest, Box::new(SlowStage))
            .build();
        let (cycle, _outcome) = pipeline.run_cycle(RuntimeMode::Ingest).await;
        assert_eq!(cycle.stages[0].status, StageStatus::TimedOut);
    }
}
