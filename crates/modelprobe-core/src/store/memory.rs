use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{sort_summaries, RunRepository, RunSummary};
use crate::analysis::FraudReport;
use crate::domain::{ProbeError, Result, RunId, RunRecord};

/// In-memory repository backed by two `HashMap`s.
#[derive(Debug, Default)]
pub struct MemoryRunRepository {
    runs: RwLock<HashMap<RunId, RunRecord>>,
    reports: RwLock<HashMap<String, FraudReport>>,
}

impl MemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunRepository for MemoryRunRepository {
    async fn save_run(&self, record: &RunRecord) -> Result<()> {
        self.runs
            .write()
            .await
            .insert(record.run_id.clone(), record.clone());
        Ok(())
    }

    async fn get_run(&self, run_id: &RunId) -> Result<RunRecord> {
        self.runs
            .read()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| ProbeError::RunNotFound(run_id.to_string()))
    }

    async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let mut summaries: Vec<RunSummary> =
            self.runs.read().await.values().map(RunSummary::from).collect();
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn save_report(&self, report: &FraudReport) -> Result<()> {
        self.reports
            .write()
            .await
            .insert(report.report_id.clone(), report.clone());
        Ok(())
    }

    async fn get_report(&self, report_id: &str) -> Result<FraudReport> {
        self.reports
            .read()
            .await
            .get(report_id)
            .cloned()
            .ok_or_else(|| ProbeError::ReportNotFound(report_id.to_string()))
    }
}
