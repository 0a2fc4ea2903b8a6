//! Control-plane process entrypoint.
//!
//! Wires the System Risk Controller's monitors, persistence, alerting, and
//! the orchestrator's execution pipeline, then runs cycles until a
//! shutdown signal arrives or the controller halts hard. Strategy and
//! execution logic are out of scope here (spec non-goal: strategy
//! intelligence) — their pipeline stages are placeholders that a real
//! deployment would replace with its own `StageHandler` implementations,
//! and the monitor snapshots below are static stand-ins for a live feed.

use anyhow::{Context, Result};
use control_plane::alerting::{AlertingService, ConsoleAlertSender};
use control_plane::clock::{build_clock, ClockMode};
use control_plane::config::AppConfig;
use control_plane::error::CoreError;
use control_plane::monitors::control::{ControlConfig, ControlSnapshot};
use control_plane::monitors::data_integrity::{DataIntegrityConfig, DataIntegritySnapshot};
use control_plane::monitors::execution::{ExecutionConfig, ExecutionSnapshot};
use control_plane::monitors::infrastructure::{InfrastructureConfig, InfrastructureSnapshot};
use control_plane::monitors::processing::{ProcessingConfig, ProcessingSnapshot};
use control_plane::monitors::{
    ControlMonitor, DataIntegrityMonitor, ExecutionMonitor, InfrastructureMonitor, Monitor, ProcessingMonitor,
    StaticSnapshotProvider,
};
use control_plane::orchestrator::{
    ExecutionStage, ExitCode, ModuleRegistry, Orchestrator, OrchestratorConfig, PipelineBuilder, RuntimeMode,
    StageHandler,
};
use control_plane::persistence::PersistenceLog;
use control_plane::risk_budget::{DailyRiskUsage, RiskBudgetSnapshot};
use control_plane::src_control::SystemRiskController;
use chrono::Utc;
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "control-plane", about = "Safety-critical trading control plane")]
struct Cli {
    /// Runtime mode; overrides RUNTIME_MODE and any config file setting.
    #[arg(long, value_parser = parse_mode)]
    mode: Option<RuntimeMode>,

    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_mode(s: &str) -> Result<RuntimeMode, String> {
    RuntimeMode::from_env_str(s).ok_or_else(|| format!("unknown mode '{s}'"))
}

/// A pipeline stage with no in-scope implementation yet. Running it is a
/// no-op success; it exists purely so the pipeline's declared stage set
/// for a mode has something registered.
struct UnimplementedStage;

#[async_trait::async_trait]
impl StageHandler for UnimplementedStage {
    async fn run(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

struct MonitorTickStage {
    src: Arc<SystemRiskController>,
}

#[async_trait::async_trait]
impl StageHandler for MonitorTickStage {
    async fn run(&self) -> Result<(), CoreError> {
        self.src.run_tick().await;
        Ok(())
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn nominal_control_snapshot() -> ControlSnapshot {
    ControlSnapshot {
        budget: RiskBudgetSnapshot {
            equity: 1_500.0,
            peak_equity: 1_500.0,
            current_drawdown_pct: 0.0,
            open_positions: vec![],
            open_used_pct: 0.0,
            daily: DailyRiskUsage {
                date: Utc::now().date_naive(),
                budget_limit_pct: 1.5,
                consumed_pct: 0.0,
                peak_open_pct: 0.0,
                trades_taken: 0,
                trades_rejected: 0,
                realized_pnl: 0.0,
            },
            consecutive_losses: 0,
            is_halted: false,
            equity_updated_at: Utc::now(),
        },
        committee_decision: None,
        committee_reason: None,
        observed_leverage: 1.0,
    }
}

fn nominal_data_integrity_snapshot() -> DataIntegritySnapshot {
    DataIntegritySnapshot {
        now: Utc::now(),
        sources: vec![],
        schema_mismatches: 0,
        ingestion_failures_in_window: 0,
        corrupted_payloads_in_window: 0,
    }
}

fn nominal_processing_snapshot() -> ProcessingSnapshot {
    ProcessingSnapshot {
        pipeline_errors_in_window: 0,
        state_flags_consistent: true,
        module_versions: HashMap::new(),
        expected_version: String::new(),
        last_cycle_latency_ms: 0.0,
        non_deterministic_flagged: false,
    }
}

fn nominal_execution_snapshot() -> ExecutionSnapshot {
    ExecutionSnapshot {
        rejections_in_window: 0,
        max_slippage_bps_in_window: 0.0,
        exchange_position: None,
        tracker_position: None,
        unconfirmed_orders: 0,
        exchange_errors_in_window: 0,
        oldest_pending_order_age_secs: 0,
    }
}

fn nominal_infrastructure_snapshot() -> InfrastructureSnapshot {
    InfrastructureSnapshot {
        cpu_pct: 0.0,
        memory_pct: 0.0,
        disk_pct: 0.0,
        clock_skew_ms: 0,
        db_reachable: true,
        db_errors_in_window: 0,
        process_alive: true,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref(), cli.mode) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(ExitCode::ConfigurationError as i32);
        }
    };

    init_tracing(&config.log_level);
    tracing::info!(mode = ?config.mode, data_dir = %config.data_dir, "starting control plane");

    if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new().install() {
        tracing::warn!(error = %e, "prometheus exporter failed to install, continuing without it");
    }

    std::fs::create_dir_all(&config.data_dir).context("creating data directory")?;

    let persistence = Arc::new(PersistenceLog::open(&config.db_path).context("opening persistence store")?);
    let alerting = Arc::new(AlertingService::new(Box::new(ConsoleAlertSender), Duration::from_secs(60)));
    let clock = build_clock(ClockMode::System, None);

    let monitors: Vec<Arc<dyn Monitor>> = vec![
        Arc::new(InfrastructureMonitor::new(
            InfrastructureConfig::default(),
            Box::new(StaticSnapshotProvider(nominal_infrastructure_snapshot())),
        )),
        Arc::new(DataIntegrityMonitor::new(
            DataIntegrityConfig::default(),
            Box::new(StaticSnapshotProvider(nominal_data_integrity_snapshot())),
        )),
        Arc::new(ProcessingMonitor::new(
            ProcessingConfig::default(),
            Box::new(StaticSnapshotProvider(nominal_processing_snapshot())),
        )),
        Arc::new(ExecutionMonitor::new(
            ExecutionConfig::default(),
            Box::new(StaticSnapshotProvider(nominal_execution_snapshot())),
        )),
        Arc::new(ControlMonitor::new(
            ControlConfig::default(),
            Box::new(StaticSnapshotProvider(nominal_control_snapshot())),
        )),
    ];

    let src = Arc::new(SystemRiskController::new(monitors, clock.clone(), persistence.clone(), alerting.clone()));

    let registry = ModuleRegistry::new();

    let pipeline = PipelineBuilder::new()
        .stage_timeout(Duration::from_millis(config.stage_timeout_ms))
        .with_stage(ExecutionStage::Ingest, Box::new(UnimplementedStage))
        .with_stage(ExecutionStage::Process, Box::new(UnimplementedStage))
        .with_stage(ExecutionStage::RiskScore, Box::new(UnimplementedStage))
        .with_stage(ExecutionStage::Strategy, Box::new(UnimplementedStage))
        .with_stage(ExecutionStage::Execute, Box::new(UnimplementedStage))
        .with_stage(ExecutionStage::Monitor, Box::new(MonitorTickStage { src: src.clone() }))
        .build();

    let orchestrator_config = OrchestratorConfig {
        mode: config.mode,
        cycle_interval: Duration::from_millis(config.cycle_interval_ms),
        shutdown_grace: Duration::from_millis(config.shutdown_grace_ms),
    };

    let orchestrator = Orchestrator::new(orchestrator_config, registry, pipeline, src, clock, &config.data_dir);

    let exit_code = orchestrator.run().await;
    tracing::info!(?exit_code, "control plane exiting");
    std::process::exit(exit_code as i32);
}
