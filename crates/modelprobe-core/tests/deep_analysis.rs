//! End-to-end deep analysis through the service layer with scripted adapters.

use std::sync::Arc;
use std::time::Duration;

use modelprobe_core::fakes::{Reply, ScriptedAdapter, ScriptedFactory};
use modelprobe_core::{
    AnalysisRequest, BenchmarkRunner, Classification, Confidence, FailureKind, FlagCategory,
    MemoryRunRepository, ModelConfig, Probe, ProbeCategory, ProbeService, PromptSuite,
    RunLimits, RunRequest, RunStatus, Severity, Verdict,
};

const WHO: &str = "Which model are you, exactly?";
const CUTOFF: &str = "What is your knowledge cutoff date?";
const CUTOFF_AGAIN: &str = "When does your training data end?";
const ESSAY: &str = "Explain how a hash map works.";

fn identity_suite() -> PromptSuite {
    PromptSuite::new("identity")
        .with_probe(Probe::new("who", ProbeCategory::Identity, WHO))
        .with_probe(Probe::new("cutoff", ProbeCategory::Identity, CUTOFF))
        .with_probe(Probe::new("cutoff-2", ProbeCategory::Identity, CUTOFF_AGAIN))
}

fn style_suite() -> PromptSuite {
    PromptSuite::new("style").with_probe(Probe::new("essay", ProbeCategory::Fingerprint, ESSAY))
}

/// The relay answers every name with the same underlying model.
fn relay_adapter() -> ScriptedAdapter {
    ScriptedAdapter::replying("Sure! Here is an answer.")
        .with_reply(WHO, Reply::Text("I am Claude 3.5 Sonnet, made by Anthropic.".into()))
        .with_reply(CUTOFF, Reply::Text("My knowledge cutoff is April 2024.".into()))
        .with_reply(
            CUTOFF_AGAIN,
            Reply::Text("My training data goes up to March 2025.".into()),
        )
        .with_reply(
            ESSAY,
            Reply::Text(
                "## Hash maps\n\n- Keys are hashed into buckets.\n- Collisions are chained.\n\nLet me know if you have more questions!".into(),
            ),
        )
        .with_latency_ms(800.0)
}

fn service(factory: ScriptedFactory) -> ProbeService {
    ProbeService::new(
        BenchmarkRunner::new(Arc::new(factory)),
        Arc::new(MemoryRunRepository::new()),
        RunLimits::new(3, Duration::from_secs(2)),
    )
}

#[tokio::test]
async fn relayed_models_are_flagged_as_fraud() {
    let svc = service(
        ScriptedFactory::new()
            .with("Opus 4.6", relay_adapter())
            .with("Sonnet 4.5", relay_adapter()),
    );

    let report = svc
        .deep_analysis(AnalysisRequest {
            name: "relay-audit".into(),
            models: vec![
                ModelConfig::new("Opus 4.6", "suspect"),
                ModelConfig::new("Sonnet 4.5", "suspect"),
            ],
            suites: vec![identity_suite(), style_suite()],
        })
        .await
        .unwrap();

    assert_eq!(report.verdict, Verdict::FraudDetected);
    assert!(report.severity_counts.high >= 2);
    assert!(report
        .red_flags
        .iter()
        .any(|f| f.category == FlagCategory::Similarity && f.severity == Severity::High));
    assert!(report
        .red_flags
        .iter()
        .any(|f| f.category == FlagCategory::Consistency));
    assert_eq!(report.red_flags[0].severity, Severity::High);

    let opus = report.model_report("Opus 4.6").unwrap();
    assert_eq!(opus.confidence, Confidence::Full);
    assert_eq!(opus.total_probes, 4);
    assert_eq!(opus.run_ids.len(), 2);
    assert!(opus.fingerprint.claimed_cutoffs.contains("2024-04"));
    assert!(opus.fingerprint.claimed_cutoffs.contains("2025-03"));

    let stored = svc.get_report(&report.report_id).await.unwrap();
    assert_eq!(stored, report);
    let runs = svc.list_runs().await.unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.name.starts_with("relay-audit/")));
}

#[tokio::test]
async fn consistent_honest_model_is_legitimate() {
    let honest = ScriptedAdapter::replying("Happy to help.")
        .with_reply(WHO, Reply::Text("I am gpt-4o, built by OpenAI.".into()))
        .with_reply(CUTOFF, Reply::Text("My knowledge cutoff is October 2023.".into()))
        .with_reply(
            CUTOFF_AGAIN,
            Reply::Text("My training data ends in October 2023.".into()),
        )
        .with_latency_ms(600.0);
    let svc = service(ScriptedFactory::new().with("gpt-4o", honest));

    let report = svc
        .deep_analysis(AnalysisRequest {
            name: "honest".into(),
            models: vec![ModelConfig::new("gpt-4o", "openai")],
            suites: vec![identity_suite()],
        })
        .await
        .unwrap();

    assert_eq!(report.verdict, Verdict::Legitimate);
    assert!(report.red_flags.is_empty());
    assert!(report.comparisons.is_empty());
}

#[tokio::test]
async fn dead_endpoint_lowers_confidence_without_aborting() {
    let svc = service(
        ScriptedFactory::new()
            .with("Opus 4.6", relay_adapter())
            .with("ghost", ScriptedAdapter::failing(FailureKind::Auth)),
    );

    let report = svc
        .deep_analysis(AnalysisRequest {
            name: "partial".into(),
            models: vec![
                ModelConfig::new("Opus 4.6", "suspect"),
                ModelConfig::new("ghost", "suspect"),
            ],
            suites: vec![identity_suite(), style_suite()],
        })
        .await
        .unwrap();

    let ghost = report.model_report("ghost").unwrap();
    assert_eq!(ghost.confidence, Confidence::Insufficient);
    assert!(ghost.fingerprint.insufficient_data);
    assert_eq!(ghost.errors, 4);
    assert!(report.comparisons.iter().all(|c| c.low_confidence));
    assert!(!report
        .red_flags
        .iter()
        .any(|f| f.category == FlagCategory::Similarity));
}

#[tokio::test]
async fn identical_runs_compare_as_match() {
    let svc = service(
        ScriptedFactory::new()
            .with("baseline", relay_adapter())
            .with("suspect", relay_adapter()),
    );

    let baseline = svc
        .execute_run(RunRequest::new(
            "baseline",
            vec![ModelConfig::new("baseline", "anthropic")],
            identity_suite(),
        ))
        .await
        .unwrap();
    let suspect = svc
        .execute_run(RunRequest::new(
            "suspect",
            vec![ModelConfig::new("suspect", "suspect")],
            identity_suite(),
        ))
        .await
        .unwrap();
    assert_eq!(baseline.status, RunStatus::Completed);

    let comparison = svc
        .compare_runs(&baseline.run_id, &suspect.run_id)
        .await
        .unwrap();
    assert_eq!(comparison.classification, Classification::Match);
    assert_eq!(comparison.model_scores.len(), 1);
}

fn who_and_essay_suite() -> PromptSuite {
    PromptSuite::new("who-and-essay")
        .with_probe(Probe::new("who", ProbeCategory::Identity, WHO))
        .with_probe(Probe::new("essay", ProbeCategory::Fingerprint, ESSAY))
}

async fn run_single(svc: &ProbeService, model: &str) -> modelprobe_core::RunRecord {
    let record = svc
        .execute_run(RunRequest::new(
            model,
            vec![ModelConfig::new(model, "suspect")],
            who_and_essay_suite(),
        ))
        .await
        .unwrap();
    assert!(record.status.is_terminal());
    record
}

#[tokio::test]
async fn different_models_compare_as_mismatch() {
    let unrelated = ScriptedAdapter::replying("unused")
        .with_reply(
            WHO,
            Reply::Text(
                "Perhaps I might be a small assistant trained somewhere, it is hard to say for sure since my memory of such details is vague".into(),
            ),
        )
        .with_reply(
            ESSAY,
            Reply::Text(
                "Maybe a table of slots holds values and a function decides the slot, though it could be organised in other ways as well depending on what the library authors chose over time".into(),
            ),
        )
        .with_latency_ms(20_000.0);
    let svc = service(
        ScriptedFactory::new()
            .with("baseline", relay_adapter())
            .with("suspect", unrelated),
    );

    let baseline = run_single(&svc, "baseline").await;
    let suspect = run_single(&svc, "suspect").await;
    let comparison = svc
        .compare_runs(&baseline.run_id, &suspect.run_id)
        .await
        .unwrap();

    assert_eq!(comparison.classification, Classification::Mismatch);
    assert!(!comparison.score.low_confidence);
    let dims = &comparison.score.dimensions;
    assert!(dims.latency.unwrap() < 0.1);
    assert_eq!(dims.identity, Some(0.0));
    assert!(comparison.score.shared_claims.is_empty());
    assert!(comparison.details.starts_with("MISMATCH"));
}

#[tokio::test]
async fn failed_suspect_run_compares_as_inconclusive() {
    let svc = service(
        ScriptedFactory::new()
            .with("baseline", relay_adapter())
            .with("suspect", ScriptedAdapter::failing(FailureKind::Http)),
    );

    let baseline = run_single(&svc, "baseline").await;
    let suspect = run_single(&svc, "suspect").await;
    assert_eq!(suspect.status, RunStatus::Completed);
    let comparison = svc
        .compare_runs(&baseline.run_id, &suspect.run_id)
        .await
        .unwrap();

    assert_eq!(comparison.classification, Classification::Inconclusive);
    assert!(comparison.score.low_confidence);
    assert_eq!(comparison.score.overall_score, None);
    assert!(comparison.model_scores.iter().all(|s| s.low_confidence));
}
