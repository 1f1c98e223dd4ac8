//! Run records appended to the run ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one end-to-end pipeline run. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique identifier for this run
    pub id: Uuid,

    /// When the run started (UTC)
    pub timestamp: DateTime<Utc>,

    /// Per-stage outcomes in execution order, including the synthetic
    /// `generate` and `deliver` stages
    pub stages: Vec<StageRecord>,

    /// Overall run status
    pub status: RunStatus,

    /// Wall-clock duration of the run
    pub duration_ms: u64,

    /// Error message for failed runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunRecord {
    /// Look up a stage's recorded outcome by name.
    pub fn stage_status(&self, name: &str) -> Option<StageStatus> {
        self.stages
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.status)
    }
}

/// Outcome of one stage within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    pub status: StageStatus,
}

impl StageRecord {
    pub fn new(name: impl Into<String>, status: StageStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Per-stage outcome classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Every provider contributed cleanly
    Succeeded,

    /// Partial but non-empty data was obtained
    Degraded,

    /// No usable data
    Failed,
}

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every stage, generation, and delivery succeeded cleanly
    Succeeded,

    /// At least one non-critical stage degraded or failed, but the brief
    /// was generated and delivered
    PartiallySucceeded,

    /// A critical stage or the generation/delivery hand-off failed
    Failed,
}

impl RunStatus {
    /// Process exit code communicated to an external scheduler.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Succeeded | Self::PartiallySucceeded => 0,
            Self::Failed => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serialization() {
        let record = RunRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            stages: vec![
                StageRecord::new("news", StageStatus::Degraded),
                StageRecord::new("generate", StageStatus::Succeeded),
            ],
            status: RunStatus::PartiallySucceeded,
            duration_ms: 4200,
            error: None,
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: RunRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.status, RunStatus::PartiallySucceeded);
        assert_eq!(parsed.stage_status("news"), Some(StageStatus::Degraded));
        assert_eq!(parsed.stage_status("market"), None);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunStatus::Succeeded.exit_code(), 0);
        assert_eq!(RunStatus::PartiallySucceeded.exit_code(), 0);
        assert_eq!(RunStatus::Failed.exit_code(), 1);
    }
}
