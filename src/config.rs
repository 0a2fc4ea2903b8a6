//! Process configuration (spec §6, SPEC_FULL §A.3).
//!
//! Precedence, highest wins: explicit TOML file > environment variables >
//! built-in defaults. Defaults mirror `risk_budget::RiskBudgetConfig`'s own
//! 1500 USD tier (see `original_source/risk_budget_manager/config.py`'s
//! "DEFAULT CONFIGURATION" block) so a config-less process and a process
//! pointed at an empty TOML file behave identically.

use crate::error::CoreError;
use crate::orchestrator::RuntimeMode;
use crate::risk_budget::RiskBudgetConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub mode: Option<String>,
    pub log_level: Option<String>,
    pub data_dir: Option<String>,
    pub db_path: Option<String>,
    pub cycle_interval_ms: Option<u64>,
    pub stage_timeout_ms: Option<u64>,
    pub shutdown_grace_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: RuntimeMode,
    pub log_level: String,
    pub data_dir: String,
    pub db_path: String,
    pub cycle_interval_ms: u64,
    pub stage_timeout_ms: u64,
    pub shutdown_grace_ms: u64,
    pub risk_budget: RiskBudgetConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::Full,
            log_level: "info".to_string(),
            data_dir: "./data".to_string(),
            db_path: "./data/control.sqlite".to_string(),
            cycle_interval_ms: 1_000,
            stage_timeout_ms: 10_000,
            shutdown_grace_ms: 10_000,
            risk_budget: RiskBudgetConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration following the documented precedence. `toml_path`
    /// is optional — a missing file is not an error, only a missing file
    /// that was explicitly requested via `--config`/`CONFIG_PATH` is.
    pub fn load(toml_path: Option<&Path>, cli_mode: Option<RuntimeMode>) -> Result<Self, CoreError> {
        let mut config = AppConfig::default();

        if let Some(path) = toml_path {
            let text = std::fs::read_to_string(path)
                .map_err(|e| CoreError::Configuration(format!("reading {}: {e}", path.display())))?;
            let file: FileConfig = toml::from_str(&text)
                .map_err(|e| CoreError::Configuration(format!("parsing {}: {e}", path.display())))?;
            config.apply_file(file)?;
        }

        config.apply_env()?;

        if let Some(mode) = cli_mode {
            config.mode = mode;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) -> Result<(), CoreError> {
        if let Some(mode) = file.mode {
            self.mode = RuntimeMode::from_env_str(&mode)
                .ok_or_else(|| CoreError::Configuration(format!("unknown mode '{mode}' in config file")))?;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
        if let Some(v) = file.data_dir {
            self.data_dir = v;
        }
        if let Some(v) = file.db_path {
            self.db_path = v;
        }
        if let Some(v) = file.cycle_interval_ms {
            self.cycle_interval_ms = v;
        }
        if let Some(v) = file.stage_timeout_ms {
            self.stage_timeout_ms = v;
        }
        if let Some(v) = file.shutdown_grace_ms {
            self.shutdown_grace_ms = v;
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), CoreError> {
        if let Ok(v) = std::env::var("RUNTIME_MODE") {
            self.mode = RuntimeMode::from_env_str(&v)
                .ok_or_else(|| CoreError::Configuration(format!("unknown RUNTIME_MODE '{v}'")))?;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Ok(v) = std::env::var("DATA_DIR") {
            self.data_dir = v;
        }
        if let Ok(v) = std::env::var("DB_PATH") {
            self.db_path = v;
        }
        if let Ok(v) = std::env::var("CYCLE_INTERVAL_MS") {
            self.cycle_interval_ms = v
                .parse()
                .map_err(|_| CoreError::Configuration(format!("invalid CYCLE_INTERVAL_MS '{v}'")))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.cycle_interval_ms == 0 {
            return Err(CoreError::Configuration("cycle_interval_ms must be > 0".into()));
        }
        if self.stage_timeout_ms == 0 {
            return Err(CoreError::Configuration("stage_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mode, RuntimeMode::Full);
    }

    #[test]
    fn cli_mode_overrides_default() {
        let config = AppConfig::load(None, Some(RuntimeMode::Ingest)).unwrap();
        assert_eq!(config.mode, RuntimeMode::Ingest);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "mode = \"trade\"\nlog_level = \"debug\"\n").unwrap();
        let config = AppConfig::load(Some(&path), None).unwrap();
        assert_eq!(config.mode, RuntimeMode::Trade);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/config.toml")), None);
        assert!(result.is_err());
    }
}
