//! Deep analysis: run every suite over the whole model set, fingerprint each
//! model across all suites, compare every pair and hand the evidence to the
//! verdict engine.
//!
//! Probe failures never abort an analysis. A suite in which every probe for a
//! model failed is listed under that model's `failed_suites` and lowers its
//! confidence; the report is still produced. Only configuration errors are
//! returned, before any probe is sent.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::compare::{self, SimilarityScore};
use crate::domain::{BenchmarkRunResult, ModelConfig, ProbeError, PromptSuite, Result, RunId};
use crate::fingerprint::{self, Fingerprint};
use crate::obs;
use crate::runner::{BenchmarkRunner, RunLimits};
use crate::verdict::{self, Evidence, RedFlag, SeverityCounts, Verdict};

/// How much of a model's evidence is backed by successful probes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Full,
    /// At least one suite failed completely for this model.
    Reduced,
    /// No usable response at all.
    Insufficient,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Confidence::Full => "full",
            Confidence::Reduced => "reduced",
            Confidence::Insufficient => "insufficient",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelReport {
    pub model_name: String,
    pub provider: String,
    pub fingerprint: Fingerprint,
    /// Run id per suite name.
    pub run_ids: BTreeMap<String, RunId>,
    pub total_probes: usize,
    pub errors: usize,
    pub failed_suites: Vec<String>,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FraudReport {
    pub report_id: String,
    pub name: String,
    pub suites: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub verdict: Verdict,
    pub severity_counts: SeverityCounts,
    /// Severity descending, then category, then description.
    pub red_flags: Vec<RedFlag>,
    pub model_reports: Vec<ModelReport>,
    pub comparisons: Vec<SimilarityScore>,
    pub summary: String,
}

impl FraudReport {
    pub fn model_report(&self, model_name: &str) -> Option<&ModelReport> {
        self.model_reports
            .iter()
            .find(|r| r.model_name == model_name)
    }
}

/// A finished analysis together with the runs it executed.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub report: FraudReport,
    pub runs: Vec<BenchmarkRunResult>,
}

/// Runner, extractor, comparator and verdict engine in sequence.
#[derive(Clone)]
pub struct DeepAnalyzer {
    runner: BenchmarkRunner,
    limits: RunLimits,
}

impl DeepAnalyzer {
    pub fn new(runner: BenchmarkRunner, limits: RunLimits) -> Self {
        Self { runner, limits }
    }

    /// Run a deep analysis and return only the report.
    pub async fn run_deep_analysis(
        &self,
        name: &str,
        models: &[ModelConfig],
        suites: &[PromptSuite],
    ) -> Result<FraudReport> {
        Ok(self.analyze(name, models, suites).await?.report)
    }

    /// Run a deep analysis, keeping every per-suite run result.
    #[instrument(skip(self, models, suites), fields(models = models.len(), suites = suites.len()))]
    pub async fn analyze(
        &self,
        name: &str,
        models: &[ModelConfig],
        suites: &[PromptSuite],
    ) -> Result<AnalysisOutcome> {
        if suites.is_empty() {
            return Err(ProbeError::config("deep analysis needs at least one suite"));
        }
        let mut seen = std::collections::HashSet::new();
        for suite in suites {
            suite.validate()?;
            if !seen.insert(suite.name.as_str()) {
                return Err(ProbeError::config(format!(
                    "duplicate suite name '{}'",
                    suite.name
                )));
            }
        }

        let started_at = Utc::now();
        let mut runs = Vec::with_capacity(suites.len());
        for suite in suites {
            info!(suite = %suite.name, "running suite");
            runs.push(self.runner.run(models, suite, self.limits).await?);
        }

        let model_reports: Vec<ModelReport> = models
            .iter()
            .map(|model| model_report(model, &runs))
            .collect();
        let fingerprints: Vec<Fingerprint> = model_reports
            .iter()
            .map(|r| r.fingerprint.clone())
            .collect();
        let comparisons = compare::pairwise(&fingerprints);

        let evidence = model_reports
            .iter()
            .zip(models)
            .fold(Evidence::new(&comparisons), |ev, (report, config)| {
                ev.with_model(config, &report.fingerprint)
            });
        let assessment = verdict::evaluate(&evidence);
        let severity_counts = SeverityCounts::of(&assessment.red_flags);

        obs::emit_analysis_verdict(
            name,
            &assessment.verdict.to_string(),
            severity_counts.high,
            severity_counts.medium,
            severity_counts.low,
        );

        let summary = build_summary(name, assessment.verdict, &model_reports, &assessment.red_flags);
        let report = FraudReport {
            report_id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            suites: suites.iter().map(|s| s.name.clone()).collect(),
            started_at,
            completed_at: Utc::now(),
            verdict: assessment.verdict,
            severity_counts,
            red_flags: assessment.red_flags,
            model_reports,
            comparisons,
            summary,
        };
        Ok(AnalysisOutcome { report, runs })
    }
}

fn model_report(model: &ModelConfig, runs: &[BenchmarkRunResult]) -> ModelReport {
    let name = model.model_name.as_str();
    let mut run_ids = BTreeMap::new();
    let mut failed_suites = Vec::new();
    for run in runs {
        run_ids.insert(run.suite_name.clone(), run.run_id.clone());
        let mut outcomes = run.outcomes_for(name).peekable();
        if outcomes.peek().is_some() && outcomes.all(|o| o.is_error()) {
            failed_suites.push(run.suite_name.clone());
        }
    }

    let fingerprint = fingerprint::extract(name, runs.iter().flat_map(|r| r.outcomes_for(name)));
    let total_probes = runs.iter().map(|r| r.outcomes_for(name).count()).sum();
    let confidence = if fingerprint.insufficient_data {
        Confidence::Insufficient
    } else if !failed_suites.is_empty() {
        Confidence::Reduced
    } else {
        Confidence::Full
    };

    ModelReport {
        model_name: model.model_name.clone(),
        provider: model.provider.clone(),
        errors: fingerprint.error_count,
        fingerprint,
        run_ids,
        total_probes,
        failed_suites,
        confidence,
    }
}

fn build_summary(name: &str, verdict: Verdict, reports: &[ModelReport], flags: &[RedFlag]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Deep analysis '{name}': verdict {verdict}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Models analyzed: {}", reports.len());
    let _ = writeln!(out, "Red flags detected: {}", flags.len());

    for report in reports {
        let fp = &report.fingerprint;
        let _ = writeln!(out);
        let _ = writeln!(out, "- {} ({})", report.model_name, report.provider);
        let _ = writeln!(
            out,
            "  Probes: {}, Errors: {}, Confidence: {}",
            report.total_probes, report.errors, report.confidence
        );
        if let Some(latency) = fp.mean_latency_ms() {
            let _ = writeln!(out, "  Avg latency: {latency:.0}ms");
        }
        if !fp.identity_claims.is_empty() {
            let claims: Vec<&str> = fp.identity_claims.keys().take(3).map(String::as_str).collect();
            let _ = writeln!(out, "  Identity claims: {}", claims.join(", "));
        }
        if !fp.claimed_cutoffs.is_empty() {
            let cutoffs: Vec<&str> = fp.claimed_cutoffs.iter().map(String::as_str).collect();
            let _ = writeln!(out, "  Knowledge cutoffs: {}", cutoffs.join(", "));
        }
        if !report.failed_suites.is_empty() {
            let _ = writeln!(out, "  Failed suites: {}", report.failed_suites.join(", "));
        }
    }

    if !flags.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Red flags:");
        for flag in flags {
            let _ = writeln!(
                out,
                "  [{}] {}: {}",
                flag.severity, flag.category, flag.description
            );
        }
    }
    out.trim_end().to_string()
}
