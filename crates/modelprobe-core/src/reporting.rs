use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::analysis::FraudReport;
use crate::compare::{RunComparison, SimilarityScore};

/// Write any report artifact as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, artifact: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(artifact).context("serialize report artifact")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

fn score_cell(score: Option<f64>) -> String {
    match score {
        Some(s) => format!("{s:.3}"),
        None => "n/a".to_string(),
    }
}

fn push_score_row(out: &mut String, score: &SimilarityScore) {
    let d = &score.dimensions;
    out.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} | {} |\n",
        score.model_a,
        score.model_b,
        score_cell(score.overall_score),
        score_cell(d.latency),
        score_cell(d.style),
        score_cell(d.vocabulary),
        score_cell(d.identity),
    ));
}

const SCORE_HEADER: &str = "| Model A | Model B | Overall | Latency | Style | Vocabulary | Identity |\n|---|---|---|---|---|---|---|\n";

/// Render a fraud report as Markdown.
pub fn render_report_md(report: &FraudReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Fraud Report: {}\n\n", report.name));
    out.push_str(&format!("**Verdict:** {}\n\n", report.verdict));
    out.push_str(&format!(
        "- report: `{}`\n- suites: {}\n- red flags: {} high, {} medium, {} low\n\n",
        report.report_id,
        report.suites.join(", "),
        report.severity_counts.high,
        report.severity_counts.medium,
        report.severity_counts.low
    ));

    out.push_str("## Models\n");
    for m in &report.model_reports {
        out.push_str(&format!(
            "- **{}** ({}): {} probes, {} errors, confidence {}",
            m.model_name, m.provider, m.total_probes, m.errors, m.confidence
        ));
        if let Some(latency) = m.fingerprint.mean_latency_ms() {
            out.push_str(&format!(", mean latency {latency:.0}ms"));
        }
        out.push('\n');
    }
    out.push('\n');

    if !report.red_flags.is_empty() {
        out.push_str("## Red Flags\n");
        for flag in &report.red_flags {
            out.push_str(&format!(
                "- [{}] {}: {}\n  - evidence: {}\n",
                flag.severity, flag.category, flag.description, flag.evidence
            ));
        }
        out.push('\n');
    }

    if !report.comparisons.is_empty() {
        out.push_str("## Similarity\n");
        out.push_str(SCORE_HEADER);
        for score in &report.comparisons {
            push_score_row(&mut out, score);
        }
    }
    out
}

/// Write the Markdown rendering of a fraud report.
pub fn write_report_md(path: &Path, report: &FraudReport) -> Result<()> {
    let md = render_report_md(report);
    std::fs::write(path, md).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Render a run comparison as Markdown.
pub fn render_comparison_md(comparison: &RunComparison) -> String {
    let mut out = String::new();
    out.push_str("# Run Comparison\n\n");
    out.push_str(&format!(
        "- baseline: `{}`\n- suspect: `{}`\n- classification: {}\n- score: {}\n\n",
        comparison.baseline_run_id,
        comparison.suspect_run_id,
        comparison.classification,
        score_cell(comparison.score.overall_score)
    ));
    if !comparison.model_scores.is_empty() {
        out.push_str("## Per Model\n");
        out.push_str(SCORE_HEADER);
        for score in &comparison.model_scores {
            push_score_row(&mut out, score);
        }
    }
    out
}
