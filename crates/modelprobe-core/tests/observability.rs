//! Observability tests for the run and analysis lifecycle.
//!
//! These tests verify that structured tracing events are emitted for the key
//! lifecycle points: run start, probe failure, run finish, comparison and
//! analysis verdict.

use std::sync::Arc;
use std::time::Duration;

use modelprobe_core::fakes::{ScriptedAdapter, ScriptedFactory};
use modelprobe_core::obs::{
    emit_analysis_verdict, emit_comparison, emit_probe_failed, emit_run_finished,
    emit_run_started, run_span,
};
use modelprobe_core::{
    BenchmarkRunner, FailureKind, ModelConfig, Probe, ProbeCategory, PromptSuite, RunLimits,
};
use tracing::Instrument;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_run_started_logs_suite_and_counts() {
    emit_run_started("run-123", "identity", 2, 6);
    assert!(logs_contain("run.started"));
    assert!(logs_contain("run-123"));
}

#[traced_test]
#[test]
fn test_emit_run_finished_logs_duration() {
    emit_run_finished("run-456", 5000, 42, true);
    assert!(logs_contain("run.finished"));
    assert!(logs_contain("partial=true"));
}

#[traced_test]
#[test]
fn test_emit_probe_failed_logs_warning() {
    let error_msg = "adapter timeout after 30s";
    emit_probe_failed("run-err-001", "gpt-4o", "who", &error_msg);
    assert!(logs_contain("WARN"));
    assert!(logs_contain("probe.failed"));
}

#[traced_test]
#[test]
fn test_emit_comparison_and_verdict() {
    emit_comparison("a", "b", Some(0.92), "MATCH");
    emit_analysis_verdict("audit", "FRAUD_DETECTED", 2, 0, 1);
    assert!(logs_contain("comparison.completed"));
    assert!(logs_contain("analysis.verdict"));
}

#[traced_test]
#[tokio::test]
async fn test_run_span_tags_events() {
    async {
        tracing::info!("inside");
    }
    .instrument(run_span("span-run-7"))
    .await;
    assert!(logs_contain("span-run-7"));
}

#[traced_test]
#[tokio::test]
async fn test_runner_emits_lifecycle_events() {
    let factory = ScriptedFactory::new()
        .with("gpt-4o", ScriptedAdapter::replying("I am gpt-4o."))
        .with("broken", ScriptedAdapter::failing(FailureKind::Transport));
    let runner = BenchmarkRunner::new(Arc::new(factory));
    let suite = PromptSuite::new("identity").with_probe(Probe::new(
        "who",
        ProbeCategory::Identity,
        "Which model are you?",
    ));

    let result = runner
        .run(
            &[
                ModelConfig::new("gpt-4o", "openai"),
                ModelConfig::new("broken", "suspect"),
            ],
            &suite,
            RunLimits::new(2, Duration::from_secs(1)),
        )
        .await
        .unwrap();

    assert_eq!(result.outcomes.len(), 2);
    assert!(logs_contain("run.started"));
    assert!(logs_contain("probe.failed"));
    assert!(logs_contain("run.finished"));
}
