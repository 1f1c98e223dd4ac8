//! Data structures for the digest pipeline.
//!
//! This module contains the core data structures:
//! - Stage: Pipeline and stage definitions
//! - Payload/Item: Provider output
//! - PipelineContext: Shared per-run state
//! - Brief: Generation output schema
//! - RunRecord: Ledger entries

pub mod brief;
pub mod context;
pub mod errors;
pub mod item;
pub mod record;
pub mod stage;

// Re-export commonly used types
pub use brief::{Brief, RenderedBrief, SchemaError, Story};
pub use context::{Diagnostic, PipelineContext};
pub use errors::{CriticalStageFailure, FetchError, StageFailure};
pub use item::{dedup_key, Item, Payload};
pub use record::{RunRecord, RunStatus, StageRecord, StageStatus};
pub use stage::{CombinationMode, Criticality, PipelineDef, StageDef};
