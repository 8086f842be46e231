//! Benchmark runner: every probe of a suite against every model, under a
//! bounded number of concurrent adapter calls.
//!
//! Permits are acquired in the dispatch loop before a task is spawned, so no
//! more than `concurrency_limit` adapter calls are ever in flight. Each task
//! owns exactly one outcome slot and hands it back through its join handle.
//! A per-call failure only marks that slot; it never aborts the run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, Instrument};

use crate::adapter::{AdapterFactory, ModelAdapter};
use crate::domain::{
    BenchmarkRunResult, FailureKind, ModelConfig, Probe, ProbeError, ProbeFailure, ProbeOutcome,
    PromptSuite, Result, RunId,
};
use crate::fingerprint;
use crate::metrics::RunMetrics;
use crate::obs;

/// Default number of concurrent adapter calls per run.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Resource limits applied to one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub concurrency_limit: usize,
    pub per_call_timeout: Duration,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            per_call_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RunLimits {
    pub fn new(concurrency_limit: usize, per_call_timeout: Duration) -> Self {
        Self {
            concurrency_limit,
            per_call_timeout,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency_limit == 0 {
            return Err(ProbeError::config("concurrency_limit must be at least 1"));
        }
        if self.per_call_timeout.is_zero() {
            return Err(ProbeError::config("per_call_timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Executes prompt suites against model endpoints.
#[derive(Clone)]
pub struct BenchmarkRunner {
    factory: Arc<dyn AdapterFactory>,
}

impl BenchmarkRunner {
    pub fn new(factory: Arc<dyn AdapterFactory>) -> Self {
        Self { factory }
    }

    /// Run `suite` against `models` under a fresh run id.
    pub async fn run(
        &self,
        models: &[ModelConfig],
        suite: &PromptSuite,
        limits: RunLimits,
    ) -> Result<BenchmarkRunResult> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run_with_cancel(RunId::new(), models, suite, limits, cancel_rx)
            .await
    }

    /// Run `suite` against `models`, stopping dispatch once `cancel` turns
    /// `true`. Slots that were never dispatched come back as cancelled
    /// failures and the result is marked partial.
    ///
    /// Only configuration problems are returned as `Err`, always before any
    /// adapter call is made.
    pub async fn run_with_cancel(
        &self,
        run_id: RunId,
        models: &[ModelConfig],
        suite: &PromptSuite,
        limits: RunLimits,
        cancel: watch::Receiver<bool>,
    ) -> Result<BenchmarkRunResult> {
        validate_inputs(models, suite, &limits)?;
        let adapters = self.resolve_adapters(models)?;

        let span = obs::run_span(run_id.as_str());
        execute(run_id, models, suite, limits, adapters, cancel)
            .instrument(span)
            .await
    }

    /// Validate inputs and resolve every adapter without dispatching anything.
    pub fn check(&self, models: &[ModelConfig], suite: &PromptSuite, limits: RunLimits) -> Result<()> {
        validate_inputs(models, suite, &limits)?;
        self.resolve_adapters(models).map(|_| ())
    }

    fn resolve_adapters(&self, models: &[ModelConfig]) -> Result<Vec<Arc<dyn ModelAdapter>>> {
        models
            .iter()
            .map(|model| {
                self.factory.adapter_for(model).map_err(|e| {
                    if e.is_configuration() {
                        e
                    } else {
                        ProbeError::config(format!(
                            "cannot build adapter for '{}': {e}",
                            model.model_name
                        ))
                    }
                })
            })
            .collect()
    }
}

fn validate_inputs(models: &[ModelConfig], suite: &PromptSuite, limits: &RunLimits) -> Result<()> {
    if models.is_empty() {
        return Err(ProbeError::config("at least one model is required"));
    }
    limits.validate()?;
    suite.validate()?;

    let mut seen = std::collections::HashSet::new();
    for model in models {
        model.validate()?;
        if !seen.insert(model.model_name.as_str()) {
            return Err(ProbeError::config(format!(
                "duplicate model name '{}'",
                model.model_name
            )));
        }
    }
    Ok(())
}

async fn execute(
    run_id: RunId,
    models: &[ModelConfig],
    suite: &PromptSuite,
    limits: RunLimits,
    adapters: Vec<Arc<dyn ModelAdapter>>,
    mut cancel: watch::Receiver<bool>,
) -> Result<BenchmarkRunResult> {
    let started_at = Utc::now();
    let probes_per_model = suite.len();
    let total = models.len() * probes_per_model;
    obs::emit_run_started(run_id.as_str(), &suite.name, models.len(), probes_per_model);

    let sem = Arc::new(Semaphore::new(limits.concurrency_limit));
    let metrics = Arc::new(RunMetrics::new());
    let probes: Vec<Arc<Probe>> = suite.probes.iter().cloned().map(Arc::new).collect();

    let mut slots: Vec<Option<JoinHandle<ProbeOutcome>>> = Vec::with_capacity(total);
    let mut cancelled = false;

    for (model, adapter) in models.iter().zip(adapters) {
        let model = Arc::new(model.clone());
        for probe in &probes {
            if cancelled {
                slots.push(None);
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = wait_for_cancel(&mut cancel) => None,
                permit = Arc::clone(&sem).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                debug!(run_id = %run_id, "cancellation observed, no further dispatch");
                cancelled = true;
                slots.push(None);
                continue;
            };

            let task = ProbeTask {
                adapter: Arc::clone(&adapter),
                model: Arc::clone(&model),
                probe: Arc::clone(probe),
                timeout: limits.per_call_timeout,
                metrics: Arc::clone(&metrics),
            };
            slots.push(Some(tokio::spawn(
                async move {
                    let _permit = permit;
                    task.call().await
                }
                .in_current_span(),
            )));
        }
    }

    let mut outcomes = Vec::with_capacity(total);
    for (idx, slot) in slots.into_iter().enumerate() {
        let model = &models[idx / probes_per_model];
        let probe = &suite.probes[idx % probes_per_model];

        let outcome = match slot {
            Some(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => ProbeOutcome::failure(
                    probe,
                    &model.model_name,
                    ProbeFailure::new(
                        FailureKind::Internal,
                        format!("probe task failed: {join_err}"),
                    ),
                    0.0,
                ),
            },
            None => ProbeOutcome::failure(probe, &model.model_name, ProbeFailure::cancelled(), 0.0),
        };

        match &outcome.error {
            None => metrics.record_success(),
            Some(failure) => {
                metrics.record_failure(failure.kind);
                if failure.kind != FailureKind::Cancelled {
                    obs::emit_probe_failed(
                        run_id.as_str(),
                        &model.model_name,
                        &probe.probe_id,
                        &failure.message,
                    );
                }
            }
        }
        outcomes.push(outcome);
    }

    let fingerprints = models
        .iter()
        .map(|m| {
            fingerprint::extract(
                &m.model_name,
                outcomes.iter().filter(|o| o.model_name == m.model_name),
            )
        })
        .collect();

    let result = BenchmarkRunResult {
        run_id,
        suite_name: suite.name.clone(),
        suite_digest: suite.digest(),
        models: models.to_vec(),
        outcomes,
        fingerprints,
        stats: metrics.snapshot(total),
        partial: cancelled,
        started_at,
        completed_at: Utc::now(),
    };

    metrics.flush(result.run_id.as_str());
    obs::emit_run_finished(
        result.run_id.as_str(),
        result.duration_ms(),
        result.outcomes.len(),
        result.partial,
    );
    Ok(result)
}

/// Resolves once the cancel flag is `true`. A dropped sender means the run
/// can no longer be cancelled, so the future then never resolves.
async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// One (probe, model) slot.
struct ProbeTask {
    adapter: Arc<dyn ModelAdapter>,
    model: Arc<ModelConfig>,
    probe: Arc<Probe>,
    timeout: Duration,
    metrics: Arc<RunMetrics>,
}

impl ProbeTask {
    async fn call(self) -> ProbeOutcome {
        let call = self.metrics.start_call();
        let started = Instant::now();
        let result = tokio::time::timeout(
            self.timeout,
            self.adapter
                .complete(&self.probe.prompt_text, &self.model, self.timeout),
        )
        .await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        drop(call);

        let model_name = self.model.model_name.as_str();
        match result {
            Ok(Ok(completion)) => ProbeOutcome::success(
                &self.probe,
                model_name,
                completion.text,
                completion.latency_ms.unwrap_or(elapsed_ms),
                completion.token_usage,
                completion.reported_model_id,
            ),
            Ok(Err(err)) => {
                ProbeOutcome::failure(&self.probe, model_name, ProbeFailure::from(&err), elapsed_ms)
            }
            Err(_) => {
                let err = ProbeError::AdapterTimeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                };
                ProbeOutcome::failure(&self.probe, model_name, ProbeFailure::from(&err), elapsed_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProbeCategory;
    use crate::fakes::{Reply, ScriptedAdapter, ScriptedFactory};

    fn suite(n: usize) -> PromptSuite {
        (0..n).fold(PromptSuite::new("smoke"), |s, i| {
            s.with_probe(Probe::new(
                format!("p{i}"),
                ProbeCategory::Capability,
                format!("prompt {i}"),
            ))
        })
    }

    fn model(name: &str) -> ModelConfig {
        ModelConfig::new(name, "openai")
    }

    fn limits(k: usize, timeout_ms: u64) -> RunLimits {
        RunLimits::new(k, Duration::from_millis(timeout_ms))
    }

    #[tokio::test]
    async fn every_slot_gets_an_outcome_in_suite_order() {
        let factory = ScriptedFactory::new()
            .with("a", ScriptedAdapter::replying("hello from a"))
            .with(
                "b",
                ScriptedAdapter::replying("fine")
                    .with_reply("prompt 1", Reply::Fail(FailureKind::Http)),
            );
        let runner = BenchmarkRunner::new(Arc::new(factory));

        let result = runner
            .run(&[model("a"), model("b")], &suite(3), limits(2, 1_000))
            .await
            .unwrap();

        assert_eq!(result.outcomes.len(), 6);
        let order: Vec<(&str, &str)> = result
            .outcomes
            .iter()
            .map(|o| (o.model_name.as_str(), o.probe_id.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a", "p0"),
                ("a", "p1"),
                ("a", "p2"),
                ("b", "p0"),
                ("b", "p1"),
                ("b", "p2"),
            ]
        );
        let failed = &result.outcomes[4];
        assert_eq!(failed.error.as_ref().unwrap().kind, FailureKind::Http);
        assert!(failed.response_text.is_none());
        assert_eq!(result.stats.succeeded, 5);
        assert_eq!(result.stats.failed, 1);
        assert!(!result.partial);
        assert_eq!(result.fingerprints.len(), 2);
    }

    #[tokio::test]
    async fn in_flight_calls_never_exceed_the_limit() {
        let adapter = ScriptedAdapter::replying("ok").with_delay(Duration::from_millis(20));
        let factory = ScriptedFactory::new().with("a", adapter.clone());
        let factory = factory.with("b", adapter.clone());
        let runner = BenchmarkRunner::new(Arc::new(factory));

        let result = runner
            .run(&[model("a"), model("b")], &suite(6), limits(3, 1_000))
            .await
            .unwrap();

        assert_eq!(result.outcomes.len(), 12);
        assert!(result.stats.peak_in_flight <= 3);
        assert!(adapter.peak_in_flight() <= 3);
        assert_eq!(adapter.calls(), 12);
    }

    #[tokio::test]
    async fn slow_calls_time_out_without_aborting_the_run() {
        let factory = ScriptedFactory::new().with(
            "a",
            ScriptedAdapter::replying("ok").with_reply("prompt 0", Reply::Hang),
        );
        let runner = BenchmarkRunner::new(Arc::new(factory));

        let result = runner
            .run(&[model("a")], &suite(2), limits(2, 50))
            .await
            .unwrap();

        let timed_out = &result.outcomes[0];
        assert_eq!(timed_out.error.as_ref().unwrap().kind, FailureKind::Timeout);
        assert!(result.outcomes[1].error.is_none());
        assert_eq!(result.stats.timed_out, 1);
    }

    #[tokio::test]
    async fn panicking_adapter_becomes_internal_failure() {
        let factory = ScriptedFactory::new().with(
            "a",
            ScriptedAdapter::replying("ok").with_reply("prompt 1", Reply::Panic),
        );
        let runner = BenchmarkRunner::new(Arc::new(factory));

        let result = runner
            .run(&[model("a")], &suite(2), limits(1, 1_000))
            .await
            .unwrap();

        assert_eq!(result.outcomes.len(), 2);
        assert_eq!(
            result.outcomes[1].error.as_ref().unwrap().kind,
            FailureKind::Internal
        );
    }

    #[tokio::test]
    async fn configuration_errors_precede_any_call() {
        let adapter = ScriptedAdapter::replying("ok");
        let factory = Arc::new(ScriptedFactory::new().with("a", adapter.clone()));
        let runner = BenchmarkRunner::new(factory);

        let empty_models = runner.run(&[], &suite(1), limits(1, 100)).await;
        assert!(empty_models.unwrap_err().is_configuration());

        let empty_suite = runner
            .run(&[model("a")], &PromptSuite::new("empty"), limits(1, 100))
            .await;
        assert!(empty_suite.unwrap_err().is_configuration());

        let zero_limit = runner.run(&[model("a")], &suite(1), limits(0, 100)).await;
        assert!(zero_limit.unwrap_err().is_configuration());

        let zero_timeout = runner.run(&[model("a")], &suite(1), limits(1, 0)).await;
        assert!(zero_timeout.unwrap_err().is_configuration());

        let duplicate = runner
            .run(&[model("a"), model("a")], &suite(1), limits(1, 100))
            .await;
        assert!(duplicate.unwrap_err().is_configuration());

        let unknown = runner
            .run(&[model("a"), model("nobody")], &suite(1), limits(1, 100))
            .await;
        assert!(unknown.unwrap_err().is_configuration());

        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn cancellation_fills_undispatched_slots() {
        let adapter = ScriptedAdapter::replying("ok").with_delay(Duration::from_millis(50));
        let factory = ScriptedFactory::new().with("a", adapter.clone());
        let runner = BenchmarkRunner::new(Arc::new(factory));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn({
            let runner = runner.clone();
            async move {
                runner
                    .run_with_cancel(RunId::new(), &[model("a")], &suite(10), limits(1, 1_000), rx)
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(75)).await;
        tx.send(true).unwrap();

        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.outcomes.len(), 10);
        assert!(result.partial);
        assert!(result.stats.cancelled > 0);
        assert_eq!(
            result.stats.succeeded + result.stats.cancelled,
            10,
            "no other failure kinds expected"
        );
        assert!(adapter.calls() < 10);
        assert!(result
            .outcomes
            .iter()
            .rev()
            .take(result.stats.cancelled)
            .all(|o| o.error.as_ref().map(|e| e.kind) == Some(FailureKind::Cancelled)));
    }

    #[tokio::test]
    async fn adapter_latency_wins_over_wall_clock() {
        let factory = ScriptedFactory::new().with(
            "a",
            ScriptedAdapter::replying("ok").with_latency_ms(1234.0),
        );
        let runner = BenchmarkRunner::new(Arc::new(factory));

        let result = runner
            .run(&[model("a")], &suite(1), limits(1, 1_000))
            .await
            .unwrap();
        assert_eq!(result.outcomes[0].latency_ms, 1234.0);
    }
}
