//! Durable key-value state files, written atomically via temp+rename.
//!
//! Backs `orchestrator_state.json`, `halt_state.json`, and
//! `drawdown_peak.json` (spec §6). Each file is a small serde-serializable
//! struct; writers never partially overwrite a file a reader might observe.

use crate::error::PersistenceError;
use serde::{de::DeserializeOwned, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A single atomically-written JSON file under a state directory.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(dir: impl AsRef<Path>, file_name: &str) -> Self {
        Self {
            path: dir.as_ref().join(file_name),
        }
    }

    /// Read the current contents, or `None` if the file does not exist yet.
    pub fn read<T: DeserializeOwned>(&self) -> Result<Option<T>, PersistenceError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::Io {
                path: self.path.display().to_string(),
                source: e,
            }),
        }
    }

    /// Write `value` atomically: serialize to a sibling temp file, flush,
    /// then rename over the target. A reader never observes a torn write.
    pub fn write<T: Serialize>(&self, value: &T) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| PersistenceError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;

        let tmp_path = dir.join(format!(
            ".{}.tmp",
            self.path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("state")
        ));

        {
            let mut tmp = std::fs::File::create(&tmp_path).map_err(|e| PersistenceError::Io {
                path: tmp_path.display().to_string(),
                source: e,
            })?;
            tmp.write_all(&bytes).map_err(|e| PersistenceError::Io {
                path: tmp_path.display().to_string(),
                source: e,
            })?;
            tmp.sync_all().map_err(|e| PersistenceError::Io {
                path: tmp_path.display().to_string(),
                source: e,
            })?;
        }

        std::fs::rename(&tmp_path, &self.path).map_err(|e| PersistenceError::Rename {
            path: self.path.display().to_string(),
            source: e,
        })
    }
}

/// Orchestrator lifecycle bookkeeping (`orchestrator_state.json`).
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct OrchestratorStateFile {
    pub current_mode: String,
    pub last_cycle_id: Option<String>,
    pub last_cycle_ts: Option<chrono::DateTime<chrono::Utc>>,
    pub shutdown_clean: bool,
}

/// Halt/resume bookkeeping (`halt_state.json`).
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct HaltStateFile {
    pub system_state: String,
    pub last_halt_event_id: Option<String>,
    pub requires_manual_resume: bool,
}

/// Drawdown peak bookkeeping (`drawdown_peak.json`).
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct DrawdownPeakFile {
    pub peak_equity: f64,
    pub peak_ts: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path(), "halt_state.json");
        assert!(file.read::<HaltStateFile>().unwrap().is_none());

        let value = HaltStateFile {
            system_state: "RUNNING".into(),
            last_halt_event_id: None,
            requires_manual_resume: false,
        };
        file.write(&value).unwrap();

        let read_back: HaltStateFile = file.read().unwrap().unwrap();
        assert_eq!(read_back.system_state, "RUNNING");
        assert!(!read_back.requires_manual_resume);
    }

    #[test]
    fn overwrite_replaces_previous_contents_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path(), "drawdown_peak.json");
        file.write(&DrawdownPeakFile {
            peak_equity: 1000.0,
            peak_ts: chrono::Utc::now(),
        })
        .unwrap();
        file.write(&DrawdownPeakFile {
            peak_equity: 2000.0,
            peak_ts: chrono::Utc::now(),
        })
        .unwrap();
        let read_back: DrawdownPeakFile = file.read().unwrap().unwrap();
        assert_eq!(read_back.peak_equity, 2000.0);

        // no stray temp file left behind
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
