//! Error taxonomy for provider calls and stage resolution.
//!
//! Provider-level errors (`FetchError`) are fully absorbed inside the stage
//! runner and fallback resolver; callers only ever see stage-level outcomes.

use thiserror::Error;

/// Classified failure from a single provider attempt.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Retryable: network timeout, rate limit, 5xx-equivalent.
    #[error("transient: {0}")]
    Transient(String),

    /// Not retryable: auth failure, malformed response schema,
    /// explicit empty-result-is-final signal.
    #[error("permanent: {0}")]
    Permanent(String),

    /// Explicit quota signal. The provider is disabled for the rest
    /// of the run, across all stages.
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),
}

impl FetchError {
    /// Whether the stage runner should retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Every provider for a stage failed (or was skipped as exhausted).
#[derive(Debug, Clone, Error)]
#[error("stage '{stage}' failed: {last_error}")]
pub struct StageFailure {
    /// Stage name
    pub stage: String,

    /// The last provider error seen before giving up
    pub last_error: FetchError,
}

/// A `Critical` stage, or the generation/delivery hand-off, failed.
///
/// This is the only error that propagates to the top of a run: it aborts
/// remaining stages, is recorded in the run ledger, and triggers exactly
/// one alert dispatch.
#[derive(Debug, Clone, Error)]
#[error("critical failure at stage '{stage}': {reason}")]
pub struct CriticalStageFailure {
    pub stage: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Transient("timeout".into()).is_transient());
        assert!(!FetchError::Permanent("bad schema".into()).is_transient());
        assert!(!FetchError::QuotaExhausted("daily cap".into()).is_transient());
    }

    #[test]
    fn test_stage_failure_display() {
        let failure = StageFailure {
            stage: "news".to_string(),
            last_error: FetchError::Transient("connection reset".into()),
        };
        assert_eq!(
            failure.to_string(),
            "stage 'news' failed: transient: connection reset"
        );
    }
}
