use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use super::{sort_summaries, RunRepository, RunSummary};
use crate::analysis::FraudReport;
use crate::domain::{ProbeError, Result, RunId, RunRecord};

/// Filesystem-backed repository, one pretty-printed JSON document per entry.
///
/// Layout: `<root>/runs/<run_id>.json` and `<root>/reports/<report_id>.json`
#[derive(Debug, Clone)]
pub struct FsRunRepository {
    runs_dir: PathBuf,
    reports_dir: PathBuf,
}

impl FsRunRepository {
    /// Create a repository rooted at `root`, creating its directories if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let runs_dir = root.as_ref().join("runs");
        let reports_dir = root.as_ref().join("reports");
        fs::create_dir_all(&runs_dir)?;
        fs::create_dir_all(&reports_dir)?;
        Ok(Self {
            runs_dir,
            reports_dir,
        })
    }

    fn document_path(dir: &Path, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !id.starts_with('.');
        valid.then(|| dir.join(format!("{id}.json")))
    }
}

/// Write `bytes` to `path` via a temp file in the same directory and a rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| std::io::Error::other("document path has no parent"))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

async fn store_json<T: Serialize>(path: PathBuf, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
        .await
        .map_err(|e| ProbeError::Storage(format!("write task failed: {e}")))??;
    Ok(())
}

/// `Ok(None)` when the document does not exist.
async fn load_json<T: DeserializeOwned + Send + 'static>(path: PathBuf) -> Result<Option<T>> {
    let bytes = tokio::task::spawn_blocking(move || match fs::read(&path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    })
    .await
    .map_err(|e| ProbeError::Storage(format!("read task failed: {e}")))??;

    match bytes {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

#[async_trait]
impl RunRepository for FsRunRepository {
    async fn save_run(&self, record: &RunRecord) -> Result<()> {
        let path = Self::document_path(&self.runs_dir, record.run_id.as_str()).ok_or_else(|| {
            ProbeError::Storage(format!("invalid run id '{}'", record.run_id))
        })?;
        store_json(path, record).await
    }

    async fn get_run(&self, run_id: &RunId) -> Result<RunRecord> {
        let not_found = || ProbeError::RunNotFound(run_id.to_string());
        let path = Self::document_path(&self.runs_dir, run_id.as_str()).ok_or_else(not_found)?;
        load_json(path).await?.ok_or_else(not_found)
    }

    async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let dir = self.runs_dir.clone();
        let paths = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<PathBuf>> {
            let mut paths = Vec::new();
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    paths.push(path);
                }
            }
            Ok(paths)
        })
        .await
        .map_err(|e| ProbeError::Storage(format!("list task failed: {e}")))??;

        let mut summaries = Vec::with_capacity(paths.len());
        for path in paths {
            match load_json::<RunRecord>(path.clone()).await {
                Ok(Some(record)) => summaries.push(RunSummary::from(&record)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable run document");
                }
            }
        }
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn save_report(&self, report: &FraudReport) -> Result<()> {
        let path = Self::document_path(&self.reports_dir, &report.report_id).ok_or_else(|| {
            ProbeError::Storage(format!("invalid report id '{}'", report.report_id))
        })?;
        store_json(path, report).await
    }

    async fn get_report(&self, report_id: &str) -> Result<FraudReport> {
        let not_found = || ProbeError::ReportNotFound(report_id.to_string());
        let path = Self::document_path(&self.reports_dir, report_id).ok_or_else(not_found)?;
        load_json(path).await?.ok_or_else(not_found)
    }
}
