//! Run and report persistence.
//!
//! [`RunRepository`] is the storage seam used by the service layer. Two
//! implementations ship with the crate: [`MemoryRunRepository`] for tests and
//! embedding, and [`FsRunRepository`] which keeps one JSON document per run
//! or report on disk.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::FraudReport;
use crate::domain::{Result, RunId, RunRecord, RunStatus};

pub use fs::FsRunRepository;
pub use memory::MemoryRunRepository;

/// Lightweight listing entry for a stored run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub run_id: RunId,
    pub name: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub models: Vec<String>,
    pub outcomes: usize,
}

impl From<&RunRecord> for RunSummary {
    fn from(record: &RunRecord) -> Self {
        let (models, outcomes) = match &record.result {
            Some(result) => (
                result.models.iter().map(|m| m.model_name.clone()).collect(),
                result.outcomes.len(),
            ),
            None => (Vec::new(), 0),
        };
        Self {
            run_id: record.run_id.clone(),
            name: record.name.clone(),
            status: record.status,
            created_at: record.created_at,
            completed_at: record.completed_at,
            models,
            outcomes,
        }
    }
}

/// Durable home for run records and fraud reports.
///
/// `save_*` overwrite any previous document with the same id. Lookups of
/// unknown ids return `RunNotFound` / `ReportNotFound`.
#[async_trait]
pub trait RunRepository: Send + Sync {
    async fn save_run(&self, record: &RunRecord) -> Result<()>;

    async fn get_run(&self, run_id: &RunId) -> Result<RunRecord>;

    /// All runs, oldest first.
    async fn list_runs(&self) -> Result<Vec<RunSummary>>;

    async fn save_report(&self, report: &FraudReport) -> Result<()>;

    async fn get_report(&self, report_id: &str) -> Result<FraudReport>;
}

fn sort_summaries(summaries: &mut [RunSummary]) {
    summaries.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.run_id.cmp(&b.run_id))
    });
}
