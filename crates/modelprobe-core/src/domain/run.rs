//! Benchmark runs and their persisted records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::model::ModelConfig;
use crate::domain::outcome::ProbeOutcome;
use crate::fingerprint::Fingerprint;

/// Unique identifier for a benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random RunId.
    pub fn new() -> Self {
        RunId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        RunId(s.to_string())
    }
}

/// Status of a run record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Counters collected while a run executes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RunStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: usize,
    /// Highest number of adapter calls in flight at the same instant.
    pub peak_in_flight: usize,
}

/// Everything a single run produced.
///
/// # Invariants
///
/// `outcomes.len() == models.len() * suite size`. Outcomes are grouped by
/// model in `models` order; within a model they follow suite order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkRunResult {
    pub run_id: RunId,
    pub suite_name: String,
    pub suite_digest: String,
    pub models: Vec<ModelConfig>,
    pub outcomes: Vec<ProbeOutcome>,
    pub fingerprints: Vec<Fingerprint>,
    pub stats: RunStats,
    /// Set when the run was cancelled before every probe was dispatched.
    pub partial: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl BenchmarkRunResult {
    /// Outcomes of one model, in suite order.
    pub fn outcomes_for<'a>(&'a self, model_name: &'a str) -> impl Iterator<Item = &'a ProbeOutcome> + 'a {
        self.outcomes
            .iter()
            .filter(move |o| o.model_name == model_name)
    }

    pub fn fingerprint_for(&self, model_name: &str) -> Option<&Fingerprint> {
        self.fingerprints.iter().find(|f| f.model_name == model_name)
    }

    pub fn model(&self, model_name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.model_name == model_name)
    }

    pub fn duration_ms(&self) -> u64 {
        (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// Persisted record of a run, as seen through the service boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub run_id: RunId,
    pub name: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<BenchmarkRunResult>,
    /// Failure message when `status == Failed`.
    pub failure: Option<String>,
}

impl RunRecord {
    pub fn pending(run_id: RunId, name: impl Into<String>) -> Self {
        Self {
            run_id,
            name: name.into(),
            status: RunStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
            failure: None,
        }
    }

    /// Record the finished result; partial results are stored as cancelled.
    pub fn finish(mut self, result: BenchmarkRunResult) -> Self {
        self.status = if result.partial {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        self.completed_at = Some(result.completed_at);
        self.result = Some(result);
        self
    }

    pub fn fail(mut self, reason: impl Into<String>) -> Self {
        self.status = RunStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.failure = Some(reason.into());
        self
    }
}
