//! Domain models for modelprobe.
//!
//! Canonical definitions for the core entities:
//! - `ModelConfig`: one endpoint/model under test
//! - `PromptSuite`: ordered probes sent to every model
//! - `ProbeOutcome`: the response (or failure) for one probe on one model
//! - `BenchmarkRunResult` / `RunRecord`: what a run produced and how it is stored

pub mod error;
pub mod model;
pub mod outcome;
pub mod run;
pub mod suite;

// Re-export main types and errors
pub use error::{ProbeError, Result};
pub use model::{ModelConfig, Protocol, Provider};
pub use outcome::{FailureKind, ProbeFailure, ProbeOutcome, TokenUsage};
pub use run::{BenchmarkRunResult, RunId, RunRecord, RunStats, RunStatus};
pub use suite::{Probe, ProbeCategory, PromptSuite};
