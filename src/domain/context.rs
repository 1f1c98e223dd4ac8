//! Shared context accumulated over one pipeline run.
//!
//! Owned exclusively by the orchestrator for the duration of a run. Each
//! stage's payload is written exactly once, after that stage resolves;
//! later stages may read earlier entries, never the reverse.

use std::collections::HashMap;

use serde::Serialize;

use super::item::Payload;

/// One provider failure, kept for diagnostics and the failure alert.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub stage: String,
    pub provider: String,
    pub error: String,
}

/// Mutable per-run mapping from stage name to resolved payload, plus an
/// ordered log of provider errors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineContext {
    payloads: HashMap<String, Payload>,
    diagnostics: Vec<Diagnostic>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a stage's resolved payload. Each stage writes exactly once.
    pub fn insert(&mut self, stage: &str, payload: Payload) {
        let previous = self.payloads.insert(stage.to_string(), payload);
        debug_assert!(previous.is_none(), "stage '{stage}' written twice");
    }

    /// Read an earlier stage's payload.
    pub fn get(&self, stage: &str) -> Option<&Payload> {
        self.payloads.get(stage)
    }

    /// Record a provider failure for diagnostics.
    pub fn record_error(&mut self, stage: &str, provider: &str, error: &str) {
        self.diagnostics.push(Diagnostic {
            stage: stage.to_string(),
            provider: provider.to_string(),
            error: error.to_string(),
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of resolved stage entries.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// JSON snapshot of all resolved payloads, handed to the generation
    /// collaborator.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "stages": self.payloads,
            "diagnostics": self.diagnostics,
        })
    }
}
