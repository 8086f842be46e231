//! ModelProbe Core Library
//!
//! Benchmark orchestration, behavioral fingerprinting, similarity scoring and
//! fraud verdicts for AI model endpoints. Provider transports live in
//! `modelprobe-adapters`; this crate only sees them through [`ModelAdapter`].

pub mod adapter;
pub mod analysis;
pub mod compare;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod fingerprint;
pub mod metrics;
pub mod obs;
pub mod reporting;
pub mod runner;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod verdict;

pub use adapter::{AdapterFactory, Completion, ModelAdapter};

pub use domain::{
    BenchmarkRunResult, FailureKind, ModelConfig, Probe, ProbeCategory, ProbeError, ProbeFailure,
    ProbeOutcome, PromptSuite, Protocol, Provider, Result, RunId, RunRecord, RunStats, RunStatus,
    TokenUsage,
};

pub use analysis::{AnalysisOutcome, Confidence, DeepAnalyzer, FraudReport, ModelReport};
pub use compare::{
    compare, compare_runs, pairwise, Classification, DimensionScores, RunComparison,
    SimilarityScore,
};
pub use config::{Credentials, Settings};
pub use fingerprint::{extract as extract_fingerprint, Fingerprint, LatencyStats, TokenStats};
pub use metrics::RunMetrics;
pub use reporting::{render_comparison_md, render_report_md, write_json, write_report_md};
pub use runner::{BenchmarkRunner, RunLimits, DEFAULT_CONCURRENCY_LIMIT, DEFAULT_TIMEOUT};
pub use service::{AnalysisRequest, ProbeService, RunRequest};
pub use store::{FsRunRepository, MemoryRunRepository, RunRepository, RunSummary};
pub use telemetry::init_tracing;
pub use verdict::{
    derive_verdict, evaluate, Assessment, Evidence, FlagCategory, ModelEvidence, RedFlag,
    Severity, SeverityCounts, Verdict,
};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
