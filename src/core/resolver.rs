//! Fallback resolution across a stage's provider set.
//!
//! Two combination modes: first-success-wins for mutually-exclusive
//! alternative sources, and merge-with-dedup for complementary sources.
//! Provider-level errors are absorbed here; callers see only the
//! stage-level outcome plus per-provider diagnostics.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::domain::{
    dedup_key, CombinationMode, FetchError, Item, Payload, StageDef, StageFailure, StageStatus,
};
use crate::providers::{FetchQuery, Provider};

use super::cancel::CancelToken;
use super::runner::{ExhaustedSet, StageRunner};

/// Stage-level result of fallback resolution.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// Every provider contributed cleanly
    Succeeded(Payload),

    /// At least one provider succeeded, but not all (merge mode only)
    Degraded(Payload),

    /// No provider produced data
    Failed(StageFailure),
}

impl StageOutcome {
    pub fn status(&self) -> StageStatus {
        match self {
            Self::Succeeded(_) => StageStatus::Succeeded,
            Self::Degraded(_) => StageStatus::Degraded,
            Self::Failed(_) => StageStatus::Failed,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Succeeded(payload) | Self::Degraded(payload) => Some(payload),
            Self::Failed(_) => None,
        }
    }
}

/// Resolution result: the outcome plus every provider failure seen along
/// the way, for the orchestrator's diagnostic log.
#[derive(Debug)]
pub struct Resolution {
    pub outcome: StageOutcome,
    pub provider_errors: Vec<(String, FetchError)>,
}

/// Resolves one stage against its ordered provider set.
#[derive(Clone)]
pub struct FallbackResolver {
    runner: Arc<StageRunner>,

    /// Cap on simultaneous in-flight provider calls within a merge stage
    max_concurrency: usize,
}

impl FallbackResolver {
    pub fn new(runner: StageRunner, max_concurrency: usize) -> Self {
        Self {
            runner: Arc::new(runner),
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Resolve a stage. Providers marked exhausted earlier in the run are
    /// skipped without invocation.
    pub async fn resolve(
        &self,
        stage: &StageDef,
        providers: &[Arc<dyn Provider>],
        query: &FetchQuery,
        exhausted: &ExhaustedSet,
        cancel: &CancelToken,
    ) -> Resolution {
        match stage.mode {
            CombinationMode::FirstSuccess => {
                self.first_success(stage, providers, query, exhausted, cancel)
                    .await
            }
            CombinationMode::MergeDedup => {
                self.merge_dedup(stage, providers, query, exhausted, cancel)
                    .await
            }
        }
    }

    /// Try providers sequentially in priority order; the first success
    /// short-circuits, so lower-priority providers are never invoked.
    /// An empty payload is still a success and does not fall through.
    async fn first_success(
        &self,
        stage: &StageDef,
        providers: &[Arc<dyn Provider>],
        query: &FetchQuery,
        exhausted: &ExhaustedSet,
        cancel: &CancelToken,
    ) -> Resolution {
        let mut provider_errors = Vec::new();
        let mut last_error = None;

        for provider in providers {
            if exhausted.contains(provider.id()) {
                debug!(
                    stage = %stage.name,
                    provider = provider.id(),
                    "Skipping exhausted provider"
                );
                let err = FetchError::QuotaExhausted("skipped, exhausted earlier in run".into());
                provider_errors.push((provider.id().to_string(), err.clone()));
                last_error = Some(err);
                continue;
            }

            match self
                .runner
                .run_provider(provider.as_ref(), query, exhausted, cancel)
                .await
            {
                Ok(payload) => {
                    info!(
                        stage = %stage.name,
                        provider = provider.id(),
                        payload = %payload.describe(),
                        "Stage resolved"
                    );
                    return Resolution {
                        outcome: StageOutcome::Succeeded(payload),
                        provider_errors,
                    };
                }
                Err(err) => {
                    provider_errors.push((provider.id().to_string(), err.clone()));
                    last_error = Some(err);
                }
            }
        }

        Resolution {
            outcome: StageOutcome::Failed(StageFailure {
                stage: stage.name.clone(),
                last_error: last_error
                    .unwrap_or_else(|| FetchError::Transient("no providers available".into())),
            }),
            provider_errors,
        }
    }

    /// Invoke all non-exhausted providers concurrently under a bounded
    /// semaphore, merge successes in provider-priority order, then drop
    /// duplicate items by normalized-title key (first-seen wins).
    ///
    /// Ordering is stabilized after collection, so the merged payload is
    /// deterministic regardless of completion order.
    async fn merge_dedup(
        &self,
        stage: &StageDef,
        providers: &[Arc<dyn Provider>],
        query: &FetchQuery,
        exhausted: &ExhaustedSet,
        cancel: &CancelToken,
    ) -> Resolution {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks: JoinSet<(usize, Result<Payload, FetchError>)> = JoinSet::new();
        let mut results: Vec<Option<Result<Payload, FetchError>>> = Vec::new();
        results.resize_with(providers.len(), || None);

        for (index, provider) in providers.iter().enumerate() {
            if exhausted.contains(provider.id()) {
                debug!(
                    stage = %stage.name,
                    provider = provider.id(),
                    "Skipping exhausted provider"
                );
                results[index] = Some(Err(FetchError::QuotaExhausted(
                    "skipped, exhausted earlier in run".into(),
                )));
                continue;
            }

            let runner = Arc::clone(&self.runner);
            let provider = Arc::clone(provider);
            let query = query.clone();
            let exhausted = exhausted.clone();
            let cancel = cancel.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                // Each provider backs off on its own task; the permit only
                // bounds simultaneous in-flight calls.
                let _permit = semaphore.acquire_owned().await;
                let result = runner
                    .run_provider(provider.as_ref(), &query, &exhausted, &cancel)
                    .await;
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(err) => warn!(stage = %stage.name, error = %err, "Provider task panicked"),
            }
        }

        let mut provider_errors = Vec::new();
        let mut merged: Vec<Item> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut successes = 0usize;
        let mut failures = 0usize;
        let mut last_error = None;

        for (provider, result) in providers.iter().zip(results) {
            let result = result.unwrap_or_else(|| {
                Err(FetchError::Transient("provider task lost".into()))
            });

            match result {
                Ok(Payload::Items(items)) => {
                    successes += 1;
                    for item in items {
                        if seen.insert(dedup_key(&item.title)) {
                            merged.push(item);
                        }
                    }
                }
                Ok(Payload::Table(_)) => {
                    // Merge stages reconcile item sequences only
                    failures += 1;
                    let err =
                        FetchError::Permanent("merge stage requires an item payload".into());
                    provider_errors.push((provider.id().to_string(), err.clone()));
                    last_error = Some(err);
                }
                Err(err) => {
                    failures += 1;
                    provider_errors.push((provider.id().to_string(), err.clone()));
                    last_error = Some(err);
                }
            }
        }

        let outcome = if successes == 0 {
            StageOutcome::Failed(StageFailure {
                stage: stage.name.clone(),
                last_error: last_error
                    .unwrap_or_else(|| FetchError::Transient("no providers available".into())),
            })
        } else {
            info!(
                stage = %stage.name,
                merged = merged.len(),
                successes,
                failures,
                "Merge stage resolved"
            );
            if failures == 0 {
                StageOutcome::Succeeded(Payload::Items(merged))
            } else {
                StageOutcome::Degraded(Payload::Items(merged))
            }
        };

        Resolution {
            outcome,
            provider_errors,
        }
    }
}
