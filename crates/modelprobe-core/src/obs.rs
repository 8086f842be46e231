//! Structured observability hooks for run and analysis lifecycle events.
//!
//! This module provides:
//! - Run-scoped tracing spans via [`run_span`], attached with `Instrument`
//! - Emission functions for key lifecycle events: run start, probe failure,
//!   run finish, comparison, and analysis verdict
//!
//! Events are emitted at `info!` level (probe failures at `warn!`). For JSON
//! output, set `MODELPROBE_LOG_FORMAT=json`.

use tracing::{info, warn};

/// Span tagged with the run_id; attach it to the run future with
/// `tracing::Instrument` so every event inside carries the id.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("modelprobe.run", run_id = %run_id)
}

/// Emit event: run started with model and probe counts.
pub fn emit_run_started(run_id: &str, suite: &str, models: usize, probes: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        suite = %suite,
        models = models,
        probes = probes,
    );
}

/// Emit event: a single probe failed (warning level).
pub fn emit_probe_failed(run_id: &str, model: &str, probe_id: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "probe.failed",
        run_id = %run_id,
        model = %model,
        probe_id = %probe_id,
        error = %error,
    );
}

/// Emit event: run finished with duration, outcome count and partial flag.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, outcomes: usize, partial: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        outcomes = outcomes,
        partial = partial,
    );
}

/// Emit event: two fingerprints or runs were compared.
pub fn emit_comparison(model_a: &str, model_b: &str, score: Option<f64>, classification: &str) {
    info!(
        event = "comparison.completed",
        model_a = %model_a,
        model_b = %model_b,
        score = score.unwrap_or(f64::NAN),
        classification = %classification,
    );
}

/// Emit event: deep analysis verdict reached.
pub fn emit_analysis_verdict(name: &str, verdict: &str, high: usize, medium: usize, low: usize) {
    info!(
        event = "analysis.verdict",
        analysis = %name,
        verdict = %verdict,
        high_flags = high,
        medium_flags = medium,
        low_flags = low,
    );
}
