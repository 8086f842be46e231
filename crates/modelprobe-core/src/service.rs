//! Service boundary over the runner, comparator, coordinator and repository.
//!
//! Every operation validates its request first and only then touches the
//! repository or an adapter. Background runs are tracked in an in-process
//! cancel map that lives as long as the service instance.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::analysis::{DeepAnalyzer, FraudReport};
use crate::compare::{self, RunComparison};
use crate::domain::{
    BenchmarkRunResult, ModelConfig, ProbeError, ProbeOutcome, PromptSuite, Result, RunId,
    RunRecord, RunStatus,
};
use crate::fingerprint::{self, Fingerprint};
use crate::runner::{BenchmarkRunner, RunLimits};
use crate::store::{RunRepository, RunSummary};

/// One benchmark run: a suite over a set of models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub name: String,
    pub models: Vec<ModelConfig>,
    pub suite: PromptSuite,
    /// Overrides the service-wide limits.
    #[serde(default)]
    pub concurrency_limit: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl RunRequest {
    pub fn new(name: impl Into<String>, models: Vec<ModelConfig>, suite: PromptSuite) -> Self {
        Self {
            name: name.into(),
            models,
            suite,
            concurrency_limit: None,
            timeout_secs: None,
        }
    }

    fn limits(&self, defaults: RunLimits) -> RunLimits {
        RunLimits {
            concurrency_limit: self.concurrency_limit.unwrap_or(defaults.concurrency_limit),
            per_call_timeout: self
                .timeout_secs
                .map(std::time::Duration::from_secs)
                .unwrap_or(defaults.per_call_timeout),
        }
    }
}

/// A deep analysis: several suites over a set of models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub name: String,
    pub models: Vec<ModelConfig>,
    pub suites: Vec<PromptSuite>,
}

#[derive(Clone)]
pub struct ProbeService {
    runner: BenchmarkRunner,
    repo: Arc<dyn RunRepository>,
    limits: RunLimits,
    active: Arc<Mutex<HashMap<RunId, watch::Sender<bool>>>>,
}

impl ProbeService {
    pub fn new(runner: BenchmarkRunner, repo: Arc<dyn RunRepository>, limits: RunLimits) -> Self {
        Self {
            runner,
            repo,
            limits,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Validate and start a run in the background; returns its id at once.
    pub async fn start_run(&self, request: RunRequest) -> Result<RunId> {
        let (run_id, _handle) = self.launch(request).await?;
        Ok(run_id)
    }

    /// Validate, run to completion and return the stored record.
    pub async fn execute_run(&self, request: RunRequest) -> Result<RunRecord> {
        let (run_id, handle) = self.launch(request).await?;
        handle
            .await
            .map_err(|e| ProbeError::Storage(format!("run {run_id} task failed: {e}")))?
    }

    async fn launch(&self, request: RunRequest) -> Result<(RunId, JoinHandle<Result<RunRecord>>)> {
        let limits = request.limits(self.limits);
        self.runner.check(&request.models, &request.suite, limits)?;

        let run_id = RunId::new();
        let mut record = RunRecord::pending(run_id.clone(), request.name.clone());
        record.status = RunStatus::Running;
        self.repo.save_run(&record).await?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.active.lock().await.insert(run_id.clone(), cancel_tx);
        info!(run_id = %run_id, name = %request.name, "run started");

        let runner = self.runner.clone();
        let repo = Arc::clone(&self.repo);
        let active = Arc::clone(&self.active);
        let task_run_id = run_id.clone();
        let handle = tokio::spawn(async move {
            let outcome = runner
                .run_with_cancel(
                    task_run_id.clone(),
                    &request.models,
                    &request.suite,
                    limits,
                    cancel_rx,
                )
                .await;
            let finished = match outcome {
                Ok(result) => record.clone().finish(result),
                Err(e) => {
                    warn!(run_id = %task_run_id, error = %e, "run failed");
                    record.clone().fail(e.to_string())
                }
            };
            let saved = match repo.save_run(&finished).await {
                Ok(()) => Ok(finished),
                Err(e) => {
                    warn!(run_id = %task_run_id, error = %e, "failed to persist run, storing it as failed");
                    let failed = record.fail(format!("result could not be stored: {e}"));
                    if let Err(retry) = repo.save_run(&failed).await {
                        warn!(run_id = %task_run_id, error = %retry, "failed to persist run failure");
                    }
                    Err(e)
                }
            };
            active.lock().await.remove(&task_run_id);
            saved
        });
        Ok((run_id, handle))
    }

    /// Whether this service instance is still executing the run.
    pub async fn is_active(&self, run_id: &RunId) -> bool {
        self.active.lock().await.contains_key(run_id)
    }

    /// Stop dispatching new probes for a running run.
    ///
    /// Returns `false` when the run exists but has already finished.
    pub async fn cancel_run(&self, run_id: &RunId) -> Result<bool> {
        if let Some(tx) = self.active.lock().await.get(run_id) {
            let _ = tx.send(true);
            info!(run_id = %run_id, "cancellation requested");
            return Ok(true);
        }
        self.repo.get_run(run_id).await.map(|_| false)
    }

    pub async fn fetch_results(&self, run_id: &RunId) -> Result<RunRecord> {
        self.repo.get_run(run_id).await
    }

    /// Outcomes of a run, optionally restricted to one model.
    pub async fn fetch_outcomes(
        &self,
        run_id: &RunId,
        model: Option<&str>,
    ) -> Result<Vec<ProbeOutcome>> {
        let result = self.completed_result(run_id).await?;
        match model {
            None => Ok(result.outcomes),
            Some(name) => {
                ensure_model(&result, name)?;
                Ok(result.outcomes_for(name).cloned().collect())
            }
        }
    }

    pub async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        self.repo.list_runs().await
    }

    pub async fn compare_runs(&self, baseline: &RunId, suspect: &RunId) -> Result<RunComparison> {
        let baseline = self.completed_result(baseline).await?;
        let suspect = self.completed_result(suspect).await?;
        Ok(compare::compare_runs(&baseline, &suspect))
    }

    pub async fn fingerprint(&self, run_id: &RunId, model: &str) -> Result<Fingerprint> {
        let result = self.completed_result(run_id).await?;
        ensure_model(&result, model)?;
        Ok(result
            .fingerprint_for(model)
            .cloned()
            .unwrap_or_else(|| fingerprint::extract(model, result.outcomes_for(model))))
    }

    /// Run a deep analysis, persisting every suite run and the report.
    pub async fn deep_analysis(&self, request: AnalysisRequest) -> Result<FraudReport> {
        let analyzer = DeepAnalyzer::new(self.runner.clone(), self.limits);
        let outcome = analyzer
            .analyze(&request.name, &request.models, &request.suites)
            .await?;

        for run in outcome.runs {
            let name = format!("{}/{}", request.name, run.suite_name);
            let record = RunRecord::pending(run.run_id.clone(), name).finish(run);
            self.repo.save_run(&record).await?;
        }
        self.repo.save_report(&outcome.report).await?;
        info!(report_id = %outcome.report.report_id, verdict = %outcome.report.verdict, "analysis stored");
        Ok(outcome.report)
    }

    pub async fn get_report(&self, report_id: &str) -> Result<FraudReport> {
        self.repo.get_report(report_id).await
    }

    async fn completed_result(&self, run_id: &RunId) -> Result<BenchmarkRunResult> {
        self.repo
            .get_run(run_id)
            .await?
            .result
            .ok_or_else(|| ProbeError::RunIncomplete(run_id.to_string()))
    }
}

fn ensure_model(result: &BenchmarkRunResult, model: &str) -> Result<()> {
    if result.model(model).is_none() {
        return Err(ProbeError::ModelNotInRun {
            run_id: result.run_id.to_string(),
            model: model.to_string(),
        });
    }
    Ok(())
}
