//! Main orchestrator for digest pipeline execution.
//!
//! Sequences stages in declaration order, applies per-stage criticality,
//! accumulates the shared context, drives the generation and delivery
//! hand-offs, records every run in the ledger, and escalates critical
//! failures through the alert channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{AlertChannel, DeliverySink, FailureNotice, Generator, Recipient};
use crate::domain::{
    Brief, CriticalStageFailure, Criticality, Payload, PipelineContext, PipelineDef, RunRecord,
    RunStatus, StageDef, StageRecord, StageStatus,
};
use crate::providers::{FetchQuery, ProviderRegistry};

use super::cancel::CancelToken;
use super::ledger::{RunLedger, DEFAULT_CAPACITY};
use super::resolver::{FallbackResolver, Resolution, StageOutcome};
use super::runner::ExhaustedSet;

/// Synthetic stage names the terminal hand-offs report under.
const STAGE_GENERATE: &str = "generate";
const STAGE_DELIVER: &str = "deliver";

/// Per-invocation flags from the control surface.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Skip delivery, still generate
    pub dry_run: bool,

    /// Tag the subject and route to the test recipient
    pub test_mode: bool,

    /// Lookback window handed to providers
    pub hours_back: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            test_mode: false,
            hours_back: 24,
        }
    }
}

/// Run-level settings that do not vary per invocation.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub recipient: Recipient,
    pub test_recipient: Recipient,
    pub ledger_path: PathBuf,
    pub ledger_capacity: usize,

    /// Cooldown before the single extra delivery retry
    pub delivery_cooldown: Duration,
}

impl RunSettings {
    pub fn new(recipient: Recipient, test_recipient: Recipient, ledger_path: PathBuf) -> Self {
        Self {
            recipient,
            test_recipient,
            ledger_path,
            ledger_capacity: DEFAULT_CAPACITY,
            delivery_cooldown: Duration::from_secs(30),
        }
    }
}

/// Main pipeline orchestrator
pub struct Orchestrator {
    pipeline: PipelineDef,
    registry: ProviderRegistry,
    resolver: FallbackResolver,
    generator: Arc<dyn Generator>,
    sink: Arc<dyn DeliverySink>,
    alert: Arc<dyn AlertChannel>,
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(
        pipeline: PipelineDef,
        registry: ProviderRegistry,
        resolver: FallbackResolver,
        generator: Arc<dyn Generator>,
        sink: Arc<dyn DeliverySink>,
        alert: Arc<dyn AlertChannel>,
        settings: RunSettings,
    ) -> Result<Self> {
        pipeline.validate()?;
        // Reject unknown provider references before any run starts
        for stage in &pipeline.stages {
            registry.bind(stage)?;
        }

        Ok(Self {
            pipeline,
            registry,
            resolver,
            generator,
            sink,
            alert,
            settings,
        })
    }

    pub fn pipeline(&self) -> &PipelineDef {
        &self.pipeline
    }

    /// Execute one end-to-end run and append its record to the ledger.
    #[instrument(skip(self, opts), fields(pipeline = %self.pipeline.name))]
    pub async fn run(&self, opts: &RunOptions) -> Result<RunRecord> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        info!(%run_id, dry_run = opts.dry_run, test_mode = opts.test_mode, "Starting pipeline run");

        let mut ledger =
            RunLedger::load(&self.settings.ledger_path, self.settings.ledger_capacity)?;

        let mut context = PipelineContext::new();
        let mut stage_records: Vec<StageRecord> = Vec::new();
        let cancel = CancelToken::new();
        let exhausted = ExhaustedSet::new();
        let mut critical: Option<CriticalStageFailure> = None;

        for stage in &self.pipeline.stages {
            let resolution = self
                .resolve_stage(stage, opts.hours_back, &exhausted, &cancel)
                .await?;

            for (provider, err) in &resolution.provider_errors {
                context.record_error(&stage.name, provider, &err.to_string());
            }

            let status = resolution.outcome.status();
            match resolution.outcome {
                StageOutcome::Succeeded(payload) => {
                    info!(stage = %stage.name, payload = %payload.describe(), "Stage succeeded");
                    context.insert(&stage.name, payload);
                }
                StageOutcome::Degraded(payload) => {
                    warn!(stage = %stage.name, payload = %payload.describe(), "Stage degraded");
                    context.insert(&stage.name, payload);
                }
                StageOutcome::Failed(failure) => {
                    // The stage's context entry is still written, empty,
                    // exactly once
                    context.insert(&stage.name, Payload::empty());

                    if stage.criticality == Criticality::Critical {
                        error!(stage = %stage.name, error = %failure, "Critical stage failed, aborting run");
                        cancel.cancel(format!("critical stage '{}' failed", stage.name));
                        stage_records.push(StageRecord::new(&stage.name, status));
                        critical = Some(CriticalStageFailure {
                            stage: stage.name.clone(),
                            reason: failure.to_string(),
                        });
                        break;
                    }

                    warn!(stage = %stage.name, error = %failure, "Non-critical stage failed, continuing");
                }
            }
            stage_records.push(StageRecord::new(&stage.name, status));
        }

        // Terminal hand-offs: generation, then delivery
        if critical.is_none() {
            match self.generator.generate(&context).await {
                Ok(brief) => {
                    info!(generator = self.generator.name(), "Brief generated");
                    stage_records.push(StageRecord::new(STAGE_GENERATE, StageStatus::Succeeded));

                    if opts.dry_run {
                        info!("Dry run: skipping delivery");
                    } else {
                        match self.deliver_with_retry(&brief, opts.test_mode).await {
                            Ok(()) => {
                                info!(sink = self.sink.name(), "Brief delivered");
                                stage_records
                                    .push(StageRecord::new(STAGE_DELIVER, StageStatus::Succeeded));
                            }
                            Err(reason) => {
                                error!(error = %reason, "Delivery failed");
                                stage_records
                                    .push(StageRecord::new(STAGE_DELIVER, StageStatus::Failed));
                                critical = Some(CriticalStageFailure {
                                    stage: STAGE_DELIVER.to_string(),
                                    reason,
                                });
                            }
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "Generation failed");
                    stage_records.push(StageRecord::new(STAGE_GENERATE, StageStatus::Failed));
                    critical = Some(CriticalStageFailure {
                        stage: STAGE_GENERATE.to_string(),
                        reason: format!("{err:#}"),
                    });
                }
            }
        }

        // Exactly one alert per failed run, through the low-dependency path
        let status = if let Some(ref failure) = critical {
            self.dispatch_alert(failure).await;
            RunStatus::Failed
        } else if stage_records
            .iter()
            .any(|s| s.status != StageStatus::Succeeded)
        {
            RunStatus::PartiallySucceeded
        } else {
            RunStatus::Succeeded
        };

        let record = RunRecord {
            id: run_id,
            timestamp: started_at,
            stages: stage_records,
            status,
            duration_ms: started.elapsed().as_millis() as u64,
            error: critical.map(|f| f.to_string()),
        };

        ledger.append(record.clone());
        ledger.save()?;

        match status {
            RunStatus::Succeeded => info!(%run_id, "Run completed"),
            RunStatus::PartiallySucceeded => warn!(%run_id, "Run completed with degraded stages"),
            RunStatus::Failed => error!(%run_id, "Run failed"),
        }

        Ok(record)
    }

    /// Resolve exactly one named stage and return its outcome, for the
    /// single-stage diagnostic mode. Does not touch the ledger.
    pub async fn run_single_stage(&self, name: &str, opts: &RunOptions) -> Result<StageOutcome> {
        let stage = self
            .pipeline
            .get_stage(name)
            .ok_or_else(|| anyhow::anyhow!("Pipeline has no stage named '{}'", name))?;

        let resolution = self
            .resolve_stage(
                stage,
                opts.hours_back,
                &ExhaustedSet::new(),
                &CancelToken::new(),
            )
            .await?;

        Ok(resolution.outcome)
    }

    async fn resolve_stage(
        &self,
        stage: &StageDef,
        hours_back: u32,
        exhausted: &ExhaustedSet,
        cancel: &CancelToken,
    ) -> Result<Resolution> {
        let providers = self.registry.bind(stage)?;
        let query = FetchQuery::new(&stage.name, hours_back);

        Ok(self
            .resolver
            .resolve(stage, &providers, &query, exhausted, cancel)
            .await)
    }

    /// Deliver with one extra retry after a fixed cooldown. Auth failures
    /// do not get the retry; a second failure of any kind gives up.
    async fn deliver_with_retry(&self, brief: &Brief, test_mode: bool) -> Result<(), String> {
        let rendered = brief.render(test_mode);
        let recipient = if test_mode {
            &self.settings.test_recipient
        } else {
            &self.settings.recipient
        };

        match self.sink.deliver(&rendered, recipient).await {
            Ok(()) => Ok(()),
            Err(crate::adapters::DeliveryError::Auth(msg)) => Err(msg),
            Err(crate::adapters::DeliveryError::Transient(msg)) => {
                warn!(
                    error = %msg,
                    cooldown_ms = self.settings.delivery_cooldown.as_millis() as u64,
                    "Delivery failed, retrying once after cooldown"
                );
                tokio::time::sleep(self.settings.delivery_cooldown).await;

                self.sink
                    .deliver(&rendered, recipient)
                    .await
                    .map_err(|e| e.to_string())
            }
        }
    }

    async fn dispatch_alert(&self, failure: &CriticalStageFailure) {
        let notice = FailureNotice::new(&failure.stage, &failure.reason);

        match self.alert.dispatch(&notice).await {
            Ok(()) => info!(stage = %failure.stage, "Failure alert dispatched"),
            // An alert failure is logged, never escalated
            Err(err) => warn!(error = %err, "Could not dispatch failure alert"),
        }
    }
}
