//! Command-line interface for briefwire.
//!
//! Provides commands for running the digest pipeline, inspecting recent
//! runs, and showing the resolved configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::adapters::{
    AlertChannel, CommandGenerator, FailureNotice, Recipient, WebhookAlert, WebhookSink,
};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    FallbackResolver, Orchestrator, RunLedger, RunOptions, RunSettings, StageOutcome, StageRunner,
    DEFAULT_CAPACITY,
};
use crate::domain::{PipelineDef, RunStatus};
use crate::providers::{HttpJsonProvider, ProviderRegistry};

/// briefwire - Daily market digest pipeline
#[derive(Parser, Debug)]
#[command(name = "briefwire")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the digest pipeline end to end
    Run {
        /// Fetch and generate but skip delivery
        #[arg(long)]
        dry_run: bool,

        /// Tag the subject and route to the test recipient
        #[arg(long)]
        test: bool,

        /// Run a single named stage and print its payload
        #[arg(long)]
        stage: Option<String>,

        /// Lookback window in hours
        #[arg(long, default_value = "24")]
        hours: u32,
    },

    /// List recent runs from the ledger
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                dry_run,
                test,
                stage,
                hours,
            } => {
                let opts = RunOptions {
                    dry_run,
                    test_mode: test,
                    hours_back: hours,
                };
                match stage {
                    Some(name) => run_single_stage(&name, opts).await,
                    None => run_pipeline(opts).await,
                }
            }
            Commands::Runs { limit } => list_runs(limit),
            Commands::Config => show_config(),
        }
    }
}

/// Alert channel used when no alert endpoint is configured.
struct DisabledAlert;

#[async_trait]
impl AlertChannel for DisabledAlert {
    async fn dispatch(&self, notice: &FailureNotice) -> Result<()> {
        warn!(stage = %notice.stage, "No alert endpoint configured, failure not escalated");
        Ok(())
    }
}

/// Load the pipeline definition: the home override if present, otherwise
/// the built-in daily pipeline.
fn load_pipeline(cfg: &ResolvedConfig) -> Result<PipelineDef> {
    let path = cfg.pipeline_path();
    let pipeline = if path.exists() {
        PipelineDef::from_file(&path)?
    } else {
        PipelineDef::default_daily()
    };
    pipeline.validate()?;
    Ok(pipeline)
}

/// Build the registry from configured provider endpoints.
fn build_registry(cfg: &ResolvedConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for (id, provider) in &cfg.providers {
        registry.register(Arc::new(HttpJsonProvider::new(id, &provider.url)));
    }
    registry
}

/// Assemble the orchestrator from resolved configuration.
fn build_orchestrator(cfg: &ResolvedConfig) -> Result<Orchestrator> {
    let pipeline = load_pipeline(cfg)?;
    let registry = build_registry(cfg);

    let runner = StageRunner::new(cfg.fetch.backoff.clone(), cfg.fetch.call_timeout);
    let resolver = FallbackResolver::new(runner, cfg.fetch.max_concurrency);

    let generator = Arc::new(CommandGenerator::new(
        &cfg.generator.command,
        cfg.generator.args.clone(),
        cfg.generator.timeout,
    ));

    let delivery = cfg
        .delivery
        .as_ref()
        .context("Config has no delivery section; add one to .briefwire/config.yaml")?;
    let sink = Arc::new(WebhookSink::new(&delivery.url));

    let alert: Arc<dyn AlertChannel> = match &cfg.alert_url {
        Some(url) => Arc::new(WebhookAlert::new(url)),
        None => Arc::new(DisabledAlert),
    };

    let mut settings = RunSettings::new(
        delivery.recipient.clone(),
        delivery.test_recipient.clone(),
        cfg.ledger_path(),
    );
    settings.delivery_cooldown = delivery.retry_cooldown;

    Orchestrator::new(
        pipeline, registry, resolver, generator, sink, alert, settings,
    )
}

/// Run the full pipeline
async fn run_pipeline(opts: RunOptions) -> Result<()> {
    let cfg = config::config()?;
    let orchestrator = build_orchestrator(cfg)?;

    let record = orchestrator.run(&opts).await?;

    for stage in &record.stages {
        eprintln!("  {}: {:?}", stage.name, stage.status);
    }

    match record.status {
        RunStatus::Succeeded => {
            eprintln!("\n[Run {} completed in {}ms]", record.id, record.duration_ms);
        }
        RunStatus::PartiallySucceeded => {
            eprintln!(
                "\n[Run {} completed with degraded stages in {}ms]",
                record.id, record.duration_ms
            );
        }
        RunStatus::Failed => {
            let reason = record.error.as_deref().unwrap_or("unknown failure");
            eprintln!("\n[Run {} failed: {}]", record.id, reason);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Run one named stage and print the resolved payload as JSON. The run
/// ledger is not touched in this mode.
async fn run_single_stage(name: &str, opts: RunOptions) -> Result<()> {
    let cfg = config::config()?;
    let orchestrator = build_orchestrator(cfg)?;

    let outcome = orchestrator.run_single_stage(name, &opts).await?;

    match &outcome {
        StageOutcome::Succeeded(payload) | StageOutcome::Degraded(payload) => {
            println!("{}", serde_json::to_string_pretty(payload)?);
            if matches!(outcome, StageOutcome::Degraded(_)) {
                eprintln!("\n[Stage '{}' resolved degraded]", name);
            }
        }
        StageOutcome::Failed(failure) => {
            eprintln!("[Stage '{}' failed: {}]", name, failure);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// List recent runs
fn list_runs(limit: usize) -> Result<()> {
    let cfg = config::config()?;
    let ledger = RunLedger::load(&cfg.ledger_path(), DEFAULT_CAPACITY)?;

    if ledger.is_empty() {
        println!("No runs recorded. Use 'briefwire run' to start one.");
        return Ok(());
    }

    println!(
        "{:<38} {:<22} {:<22} {:>10}",
        "RUN ID", "STARTED", "STATUS", "DURATION"
    );
    println!("{}", "-".repeat(96));

    // Most recent first
    for run in ledger.recent(limit).iter().rev() {
        let status = match run.status {
            RunStatus::Succeeded => "succeeded",
            RunStatus::PartiallySucceeded => "partially-succeeded",
            RunStatus::Failed => "failed",
        };
        println!(
            "{:<38} {:<22} {:<22} {:>8}ms",
            run.id,
            run.timestamp.format("%Y-%m-%d %H:%M UTC"),
            status,
            run.duration_ms
        );
        let stages: Vec<String> = run
            .stages
            .iter()
            .map(|s| format!("{}={:?}", s.name, s.status))
            .collect();
        println!("    {}", stages.join("  "));
    }

    println!("\nTotal: {} runs in ledger", ledger.len());

    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("briefwire configuration");
    println!("{}", "=".repeat(60));
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:   {}", cfg.home.display());
    println!("  Ledger: {}", cfg.ledger_path().display());
    println!();
    println!("Providers:");
    if cfg.providers.is_empty() {
        println!("  (none configured)");
    } else {
        for (id, provider) in &cfg.providers {
            println!("  {}: {}", id, provider.url);
        }
    }
    println!();
    println!("Fetch:");
    println!("  Max attempts:    {}", cfg.fetch.backoff.max_attempts);
    println!("  Base delay:      {}ms", cfg.fetch.backoff.base_delay_ms);
    println!("  Max delay:       {}ms", cfg.fetch.backoff.max_delay_ms);
    println!("  Call timeout:    {:?}", cfg.fetch.call_timeout);
    println!("  Max concurrency: {}", cfg.fetch.max_concurrency);
    println!();
    println!("Generator:");
    println!("  Command: {} {}", cfg.generator.command, cfg.generator.args.join(" "));
    println!("  Timeout: {:?}", cfg.generator.timeout);
    println!();
    match &cfg.delivery {
        Some(delivery) => {
            println!("Delivery:");
            println!("  Endpoint:       {}", delivery.url);
            println!("  Recipient:      {}", describe_recipient(&delivery.recipient));
            println!("  Test recipient: {}", describe_recipient(&delivery.test_recipient));
            println!("  Retry cooldown: {:?}", delivery.retry_cooldown);
        }
        None => println!("Delivery: (not configured)"),
    }
    println!();
    println!(
        "Alert endpoint: {}",
        cfg.alert_url.as_deref().unwrap_or("(not configured)")
    );

    Ok(())
}

fn describe_recipient(recipient: &Recipient) -> String {
    format!("{} <{}>", recipient.name, recipient.address)
}
