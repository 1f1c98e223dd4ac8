//! Single-provider execution with retry, backoff, and error classification.
//!
//! The stage runner is the only place retry semantics live: every provider
//! in every stage gets identical, testable behavior. Transient errors back
//! off and retry; permanent errors fail fast; quota exhaustion disables the
//! provider for the remainder of the run.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{FetchError, Payload};
use crate::providers::{FetchQuery, Provider};

use super::backoff::BackoffPolicy;
use super::cancel::CancelToken;

/// Run-scoped set of providers that reported quota exhaustion.
///
/// Shared across stages within one run so an exhausted provider is never
/// reattempted, even from a different stage.
#[derive(Debug, Clone, Default)]
pub struct ExhaustedSet {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl ExhaustedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, provider_id: &str) {
        if let Ok(mut set) = self.inner.lock() {
            set.insert(provider_id.to_string());
        }
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.inner
            .lock()
            .map(|set| set.contains(provider_id))
            .unwrap_or(false)
    }
}

/// Executes one provider call with retry and backoff.
#[derive(Debug, Clone)]
pub struct StageRunner {
    backoff: BackoffPolicy,

    /// Timeout applied independently to each provider call
    call_timeout: Duration,
}

impl StageRunner {
    pub fn new(backoff: BackoffPolicy, call_timeout: Duration) -> Self {
        Self {
            backoff,
            call_timeout,
        }
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Run a provider's fetch with retry.
    ///
    /// Each attempt carries its own timeout; a timeout counts as transient.
    /// Total wall-clock time is bounded by the sum of backoff delays plus
    /// `max_attempts` times the per-call timeout.
    pub async fn run_provider(
        &self,
        provider: &dyn Provider,
        query: &FetchQuery,
        exhausted: &ExhaustedSet,
        cancel: &CancelToken,
    ) -> Result<Payload, FetchError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            if cancel.is_cancelled() {
                return Err(FetchError::Transient(format!(
                    "cancelled before attempt {attempt}: {}",
                    cancel.reason().unwrap_or_default()
                )));
            }

            let result = match tokio::time::timeout(self.call_timeout, provider.fetch(query)).await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::Transient(format!(
                    "call timed out after {:?}",
                    self.call_timeout
                ))),
            };

            match result {
                Ok(payload) => {
                    debug!(
                        provider = provider.id(),
                        stage = %query.stage,
                        attempt,
                        payload = %payload.describe(),
                        "Provider fetch succeeded"
                    );
                    return Ok(payload);
                }
                Err(FetchError::QuotaExhausted(msg)) => {
                    warn!(
                        provider = provider.id(),
                        stage = %query.stage,
                        "Provider quota exhausted, disabling for this run"
                    );
                    exhausted.mark(provider.id());
                    return Err(FetchError::QuotaExhausted(msg));
                }
                Err(FetchError::Permanent(msg)) => {
                    warn!(
                        provider = provider.id(),
                        stage = %query.stage,
                        error = %msg,
                        "Provider failed permanently, not retrying"
                    );
                    return Err(FetchError::Permanent(msg));
                }
                Err(FetchError::Transient(msg)) => {
                    if !self.backoff.should_retry(attempt) {
                        warn!(
                            provider = provider.id(),
                            stage = %query.stage,
                            attempts = attempt,
                            error = %msg,
                            "Provider failed after exhausting retries"
                        );
                        return Err(FetchError::Transient(msg));
                    }

                    let delay = self.backoff.delay_with_jitter(attempt);
                    warn!(
                        provider = provider.id(),
                        stage = %query.stage,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %msg,
                        "Provider fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::domain::Item;

    /// Provider that fails with scripted errors before succeeding.
    struct FlakyProvider {
        id: String,
        failures: Vec<FetchError>,
        calls: AtomicU32,
    }

    impl FlakyProvider {
        fn new(id: &str, failures: Vec<FetchError>) -> Self {
            Self {
                id: id.to_string(),
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn id(&self) -> &str {
            &self.id
        }

        async fn fetch(&self, _query: &FetchQuery) -> Result<Payload, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            match self.failures.get(call) {
                Some(err) => Err(err.clone()),
                None => Ok(Payload::Items(vec![Item::new("ok", &self.id)])),
            }
        }
    }

    fn fast_runner(max_attempts: u32) -> StageRunner {
        StageRunner::new(
            BackoffPolicy {
                max_attempts,
                base_delay_ms: 1,
                max_delay_ms: 5,
                ..Default::default()
            },
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let provider = FlakyProvider::new(
            "newsapi",
            vec![
                FetchError::Transient("timeout".into()),
                FetchError::Transient("503".into()),
            ],
        );
        let runner = fast_runner(3);

        let result = runner
            .run_provider(
                &provider,
                &FetchQuery::new("news", 24),
                &ExhaustedSet::new(),
                &CancelToken::new(),
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_attempts_never_exceed_max() {
        let provider = FlakyProvider::new(
            "newsapi",
            vec![
                FetchError::Transient("a".into()),
                FetchError::Transient("b".into()),
                FetchError::Transient("c".into()),
                FetchError::Transient("d".into()),
            ],
        );
        let runner = fast_runner(3);

        let result = runner
            .run_provider(
                &provider,
                &FetchQuery::new("news", 24),
                &ExhaustedSet::new(),
                &CancelToken::new(),
            )
            .await;

        assert!(matches!(result, Err(FetchError::Transient(_))));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_immediately() {
        let provider =
            FlakyProvider::new("ipo_primary", vec![FetchError::Permanent("401".into())]);
        let runner = fast_runner(3);

        let result = runner
            .run_provider(
                &provider,
                &FetchQuery::new("ipo", 24),
                &ExhaustedSet::new(),
                &CancelToken::new(),
            )
            .await;

        assert!(matches!(result, Err(FetchError::Permanent(_))));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_marks_provider() {
        let provider = FlakyProvider::new(
            "newsapi",
            vec![FetchError::QuotaExhausted("daily cap".into())],
        );
        let runner = fast_runner(3);
        let exhausted = ExhaustedSet::new();

        let result = runner
            .run_provider(
                &provider,
                &FetchQuery::new("news", 24),
                &exhausted,
                &CancelToken::new(),
            )
            .await;

        assert!(matches!(result, Err(FetchError::QuotaExhausted(_))));
        assert_eq!(provider.call_count(), 1);
        assert!(exhausted.contains("newsapi"));
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_attempts() {
        let provider = FlakyProvider::new("newsapi", vec![]);
        let runner = fast_runner(3);
        let cancel = CancelToken::new();
        cancel.cancel("critical stage failed");

        let result = runner
            .run_provider(
                &provider,
                &FetchQuery::new("news", 24),
                &ExhaustedSet::new(),
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(FetchError::Transient(_))));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_call_times_out_as_transient() {
        struct SlowProvider;

        #[async_trait]
        impl Provider for SlowProvider {
            fn id(&self) -> &str {
                "slow"
            }

            async fn fetch(&self, _query: &FetchQuery) -> Result<Payload, FetchError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Payload::empty())
            }
        }

        let runner = StageRunner::new(
            BackoffPolicy {
                max_attempts: 1,
                base_delay_ms: 1,
                ..Default::default()
            },
            Duration::from_millis(20),
        );

        let result = runner
            .run_provider(
                &SlowProvider,
                &FetchQuery::new("news", 24),
                &ExhaustedSet::new(),
                &CancelToken::new(),
            )
            .await;

        match result {
            Err(FetchError::Transient(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected transient timeout, got {other:?}"),
        }
    }
}
