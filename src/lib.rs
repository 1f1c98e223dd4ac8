//! briefwire - Daily market digest pipeline
//!
//! A staged fetch-generate-deliver orchestrator for daily content
//! digests, built around provider fallback and bounded run history.
//!
//! # Architecture
//!
//! Each run walks a fixed stage sequence:
//! - Fetch stages resolve data across ordered provider sets, with retry,
//!   quota tracking, and either first-success or merge-with-dedup
//!   combination
//! - A generation stage turns the accumulated context into a brief
//! - A delivery stage sends the rendered brief to the recipient
//!
//! Critical failures abort the run and raise exactly one alert; every
//! run leaves a record in a bounded on-disk ledger.
//!
//! # Modules
//!
//! - `adapters`: Generation, delivery, and alert collaborators
//! - `core`: Orchestration logic (StageRunner, FallbackResolver, RunLedger)
//! - `domain`: Data structures (StageDef, Payload, Brief, RunRecord)
//! - `providers`: Upstream data sources
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the daily pipeline
//! briefwire run
//!
//! # Generate without delivering
//! briefwire run --dry-run
//!
//! # Inspect a single stage
//! briefwire run --stage news
//!
//! # List recent runs
//! briefwire runs
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod providers;
