//! Append-only, capacity-bounded run history with JSON persistence.
//!
//! The ledger is loaded once at orchestrator start and saved at the end of
//! the run; the orchestrator is its single owner and stage logic never
//! touches it. Persistence is a whole-document overwrite, so no partial
//! record can survive a crash mid-append.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::domain::RunRecord;

/// Default number of runs retained
pub const DEFAULT_CAPACITY: usize = 30;

/// Bounded FIFO sequence of run records, oldest first.
#[derive(Debug)]
pub struct RunLedger {
    path: PathBuf,
    capacity: usize,
    records: Vec<RunRecord>,
}

impl RunLedger {
    /// Load the ledger from disk. A missing file is an empty ledger; a
    /// corrupt file is logged and replaced on the next save.
    pub fn load(path: &Path, capacity: usize) -> Result<Self> {
        let capacity = capacity.max(1);

        let records = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read run ledger: {}", path.display()))?;

            match serde_json::from_str::<Vec<RunRecord>>(&content) {
                Ok(mut records) => {
                    // Enforce the bound even if the file was written with a
                    // larger capacity
                    if records.len() > capacity {
                        records.drain(..records.len() - capacity);
                    }
                    records
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "Run ledger is corrupt, starting empty"
                    );
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            capacity,
            records,
        })
    }

    /// Append a record, evicting the oldest first so length never exceeds
    /// capacity.
    pub fn append(&mut self, record: RunRecord) {
        while self.records.len() >= self.capacity {
            self.records.remove(0);
        }
        self.records.push(record);
    }

    /// The `n` most recent records, oldest first.
    pub fn recent(&self, n: usize) -> &[RunRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// The most recent record, if any.
    pub fn latest(&self) -> Option<&RunRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persist the full ledger, overwriting the previous document.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create ledger directory: {}", parent.display())
            })?;
        }

        let json =
            serde_json::to_string_pretty(&self.records).context("Failed to serialize ledger")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write run ledger: {}", self.path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    use crate::domain::{RunStatus, StageRecord, StageStatus};

    fn record(label: &str) -> RunRecord {
        RunRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            stages: vec![StageRecord::new(label, StageStatus::Succeeded)],
            status: RunStatus::Succeeded,
            duration_ms: 100,
            error: None,
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let temp = TempDir::new().unwrap();
        let ledger = RunLedger::load(&temp.path().join("ledger.json"), 30).unwrap();
        assert!(ledger.is_empty());
        assert!(ledger.latest().is_none());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ledger.json");
        std::fs::write(&path, "not json {{{").unwrap();

        let ledger = RunLedger::load(&path, 30).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_capacity_bound_fifo() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ledger.json");
        let mut ledger = RunLedger::load(&path, 3).unwrap();

        for i in 0..5 {
            ledger.append(record(&format!("run{i}")));
            assert!(ledger.len() <= 3);
        }

        // Oldest two evicted, survivors in order
        let names: Vec<&str> = ledger
            .recent(3)
            .iter()
            .map(|r| r.stages[0].name.as_str())
            .collect();
        assert_eq!(names, vec!["run2", "run3", "run4"]);
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ledger.json");

        let mut ledger = RunLedger::load(&path, 30).unwrap();
        ledger.append(record("first"));
        ledger.append(record("second"));
        ledger.save().unwrap();

        let reloaded = RunLedger::load(&path, 30).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.latest().unwrap().stages[0].name, "second");
    }

    #[test]
    fn test_recent_returns_tail_oldest_first() {
        let temp = TempDir::new().unwrap();
        let mut ledger = RunLedger::load(&temp.path().join("ledger.json"), 30).unwrap();

        for i in 0..10 {
            ledger.append(record(&format!("run{i}")));
        }

        let recent = ledger.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].stages[0].name, "run7");
        assert_eq!(recent[2].stages[0].name, "run9");
    }
}
