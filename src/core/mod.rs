//! Core pipeline machinery: retry, fallback, orchestration, run history.

pub mod backoff;
pub mod cancel;
pub mod ledger;
pub mod orchestrator;
pub mod resolver;
pub mod runner;

pub use backoff::BackoffPolicy;
pub use cancel::CancelToken;
pub use ledger::{RunLedger, DEFAULT_CAPACITY};
pub use orchestrator::{Orchestrator, RunOptions, RunSettings};
pub use resolver::{FallbackResolver, Resolution, StageOutcome};
pub use runner::{ExhaustedSet, StageRunner};
