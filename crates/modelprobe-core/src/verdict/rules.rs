//! The ordered rule table.

use super::names::{matches_any, names_match};
use super::{Evidence, FlagCategory, RedFlag, Severity};

/// Mean latency above which an endpoint looks relayed.
pub const LATENCY_FLAG_THRESHOLD_MS: f64 = 10_000.0;

/// Confident similarity at or above which two differently named models are
/// treated as the same underlying model.
pub const SIMILARITY_FLAG_THRESHOLD: f64 = 0.90;

/// Claims listed in a flag's evidence string.
const MAX_LISTED: usize = 5;

/// A single detection rule.
pub struct Rule {
    pub name: &'static str,
    pub severity: Severity,
    pub category: FlagCategory,
    pub check: fn(&Evidence<'_>) -> Vec<RedFlag>,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("category", &self.category)
            .finish()
    }
}

pub static RULES: &[Rule] = &[
    Rule {
        name: "identity_mismatch",
        severity: Severity::High,
        category: FlagCategory::Identity,
        check: identity_mismatch,
    },
    Rule {
        name: "inconsistent_cutoffs",
        severity: Severity::High,
        category: FlagCategory::Consistency,
        check: inconsistent_cutoffs,
    },
    Rule {
        name: "same_underlying_model",
        severity: Severity::High,
        category: FlagCategory::Similarity,
        check: same_underlying_model,
    },
    Rule {
        name: "relay_latency",
        severity: Severity::Medium,
        category: FlagCategory::Latency,
        check: relay_latency,
    },
    Rule {
        name: "reported_model_mismatch",
        severity: Severity::Low,
        category: FlagCategory::Identity,
        check: reported_model_mismatch,
    },
];

fn listed<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.take(MAX_LISTED).collect::<Vec<_>>().join(", ")
}

fn identity_mismatch(evidence: &Evidence<'_>) -> Vec<RedFlag> {
    evidence
        .usable_models()
        .filter_map(|m| {
            let claims = &m.fingerprint.identity_claims;
            if claims.is_empty() {
                return None;
            }
            let any_match = claims
                .keys()
                .any(|claim| matches_any(m.config.accepted_names(), claim));
            (!any_match).then(|| {
                RedFlag::new(
                    Severity::High,
                    FlagCategory::Identity,
                    format!(
                        "Model self-identifies differently than requested name '{}'",
                        m.config.model_name
                    ),
                    format!("Claims: {}", listed(claims.keys().map(String::as_str))),
                )
            })
        })
        .collect()
}

fn inconsistent_cutoffs(evidence: &Evidence<'_>) -> Vec<RedFlag> {
    evidence
        .usable_models()
        .filter(|m| m.fingerprint.claimed_cutoffs.len() > 1)
        .map(|m| {
            RedFlag::new(
                Severity::High,
                FlagCategory::Consistency,
                format!(
                    "Inconsistent knowledge cutoff dates from '{}'",
                    m.config.model_name
                ),
                format!(
                    "Claimed cutoffs: {}",
                    listed(m.fingerprint.claimed_cutoffs.iter().map(String::as_str))
                ),
            )
        })
        .collect()
}

fn same_underlying_model(evidence: &Evidence<'_>) -> Vec<RedFlag> {
    evidence
        .comparisons
        .iter()
        .filter(|c| c.model_a != c.model_b)
        .filter(|c| !evidence.is_insufficient(&c.model_a) && !evidence.is_insufficient(&c.model_b))
        .filter_map(|c| {
            let score = c.confident_score()?;
            (score >= SIMILARITY_FLAG_THRESHOLD).then(|| {
                RedFlag::new(
                    Severity::High,
                    FlagCategory::Similarity,
                    format!(
                        "Models '{}' and '{}' appear to be the same underlying model",
                        c.model_a, c.model_b
                    ),
                    format!(
                        "Similarity: {:.1}%, shared claims: {}",
                        score * 100.0,
                        c.shared_claims.len()
                    ),
                )
            })
        })
        .collect()
}

fn relay_latency(evidence: &Evidence<'_>) -> Vec<RedFlag> {
    evidence
        .usable_models()
        .filter_map(|m| {
            let mean = m.fingerprint.mean_latency_ms()?;
            (mean > LATENCY_FLAG_THRESHOLD_MS).then(|| {
                RedFlag::new(
                    Severity::Medium,
                    FlagCategory::Latency,
                    format!(
                        "Very high average latency ({mean:.0}ms) from '{}' suggests a proxy or relay",
                        m.config.model_name
                    ),
                    format!(
                        "Average across {} successful probes",
                        m.fingerprint.sample_count
                    ),
                )
            })
        })
        .collect()
}

fn reported_model_mismatch(evidence: &Evidence<'_>) -> Vec<RedFlag> {
    evidence
        .usable_models()
        .filter_map(|m| {
            let reported = &m.fingerprint.reported_model_ids;
            if reported.is_empty() {
                return None;
            }
            let any_match = reported.keys().any(|id| {
                m.config
                    .accepted_names()
                    .any(|name| names_match(name, id) || name.eq_ignore_ascii_case(id))
            });
            (!any_match).then(|| {
                RedFlag::new(
                    Severity::Low,
                    FlagCategory::Identity,
                    format!(
                        "Endpoint reports a different model id than requested '{}'",
                        m.config.model_name
                    ),
                    format!("Reported: {}", listed(reported.keys().map(String::as_str))),
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{compare, DimensionScores, SimilarityScore};
    use crate::domain::{
        FailureKind, ModelConfig, Probe, ProbeCategory, ProbeFailure, ProbeOutcome,
    };
    use crate::fingerprint::{self, Fingerprint};
    use crate::verdict::{derive_verdict, evaluate, Verdict};

    fn identity_outcomes(model: &str, texts: &[&str], latency: f64) -> Vec<ProbeOutcome> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let probe = Probe::new(format!("id{i}"), ProbeCategory::Identity, "who?");
                ProbeOutcome::success(&probe, model, t.to_string(), latency, None, None)
            })
            .collect()
    }

    fn fp(model: &str, texts: &[&str], latency: f64) -> Fingerprint {
        fingerprint::extract(model, &identity_outcomes(model, texts, latency))
    }

    fn score(a: &str, b: &str, overall: f64) -> SimilarityScore {
        SimilarityScore {
            model_a: a.into(),
            model_b: b.into(),
            overall_score: Some(overall),
            dimensions: DimensionScores::default(),
            shared_claims: vec![],
            low_confidence: false,
        }
    }

    #[test]
    fn distinct_cutoffs_raise_consistency_flag() {
        let config = ModelConfig::new("Opus 4.6", "suspect");
        let fingerprint = fp(
            "Opus 4.6",
            &[
                "My knowledge cutoff is April 2024.",
                "My knowledge cutoff is March 2025.",
                "My knowledge cutoff is June 2024.",
            ],
            800.0,
        );
        let evidence = Evidence::new(&[]).with_model(&config, &fingerprint);
        let flags = inconsistent_cutoffs(&evidence);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].severity, Severity::High);
        assert!(flags[0].evidence.contains("2024-04"));
    }

    #[test]
    fn foreign_identity_claim_alone_is_inconclusive() {
        let config = ModelConfig::new("Opus 4.6", "suspect");
        let fingerprint = fp(
            "Opus 4.6",
            &[
                "I am claude-3-5-sonnet-20241022.",
                "Model: claude-3-5-sonnet-20241022",
            ],
            800.0,
        );
        let evidence = Evidence::new(&[]).with_model(&config, &fingerprint);
        let assessment = evaluate(&evidence);
        assert_eq!(assessment.red_flags.len(), 1);
        assert_eq!(assessment.red_flags[0].category, FlagCategory::Identity);
        assert_eq!(assessment.red_flags[0].severity, Severity::High);
        assert_eq!(assessment.verdict, Verdict::Inconclusive);
    }

    #[test]
    fn matching_claim_or_alias_is_clean() {
        let config = ModelConfig::new("endpoint-a", "suspect").with_alias("claude-opus-4-6");
        let fingerprint = fp("endpoint-a", &["I am Claude Opus 4.6."], 800.0);
        let evidence = Evidence::new(&[]).with_model(&config, &fingerprint);
        assert!(identity_mismatch(&evidence).is_empty());
    }

    #[test]
    fn high_similarity_plus_cutoffs_is_fraud() {
        let opus = ModelConfig::new("Opus 4.6", "suspect");
        let sonnet = ModelConfig::new("Sonnet 4.5", "suspect");
        let fp_opus = fp(
            "Opus 4.6",
            &[
                "My knowledge cutoff is April 2024.",
                "My knowledge cutoff is March 2025.",
            ],
            800.0,
        );
        let fp_sonnet = fp("Sonnet 4.5", &["Hello there."], 800.0);
        let comparisons = vec![score("Opus 4.6", "Sonnet 4.5", 0.923)];
        let evidence = Evidence::new(&comparisons)
            .with_model(&opus, &fp_opus)
            .with_model(&sonnet, &fp_sonnet);

        let assessment = evaluate(&evidence);
        let categories: Vec<FlagCategory> =
            assessment.red_flags.iter().map(|f| f.category).collect();
        assert_eq!(
            categories,
            vec![FlagCategory::Consistency, FlagCategory::Similarity]
        );
        assert_eq!(assessment.verdict, Verdict::FraudDetected);
    }

    #[test]
    fn slow_endpoint_raises_medium_latency_flag() {
        let config = ModelConfig::new("gpt-4o", "openai");
        let fingerprint = fp("gpt-4o", &["Hi!"], 14_000.0);
        let evidence = Evidence::new(&[]).with_model(&config, &fingerprint);

        let flags = relay_latency(&evidence);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].severity, Severity::Medium);
        assert_eq!(derive_verdict(&flags), Verdict::Inconclusive);

        let mut combined = flags.clone();
        combined.push(RedFlag::new(Severity::High, FlagCategory::Identity, "x", "y"));
        assert_eq!(derive_verdict(&combined), Verdict::FraudDetected);
    }

    #[test]
    fn insufficient_model_is_skipped_everywhere() {
        let broken = ModelConfig::new("broken", "suspect");
        let healthy = ModelConfig::new("healthy", "suspect");
        let probe = Probe::new("p", ProbeCategory::Identity, "who?");
        let failures = vec![ProbeOutcome::failure(
            &probe,
            "broken",
            ProbeFailure::new(FailureKind::Auth, "denied"),
            20_000.0,
        )];
        let fp_broken = fingerprint::extract("broken", &failures);
        let fp_healthy = fp("healthy", &["Hello."], 100.0);
        let comparisons = vec![
            compare(&fp_broken, &fp_healthy),
            score("broken", "healthy", 0.99),
        ];
        let evidence = Evidence::new(&comparisons)
            .with_model(&broken, &fp_broken)
            .with_model(&healthy, &fp_healthy);

        let assessment = evaluate(&evidence);
        assert!(assessment.red_flags.is_empty());
        assert_eq!(assessment.verdict, Verdict::Legitimate);
    }

    #[test]
    fn reported_id_mismatch_is_low() {
        let config = ModelConfig::new("gpt-4o", "openai");
        let probe = Probe::new("p", ProbeCategory::Capability, "2+2?");
        let outcomes = vec![ProbeOutcome::success(
            &probe,
            "gpt-4o",
            "4".into(),
            100.0,
            None,
            Some("gpt-3.5-turbo-0125".into()),
        )];
        let fingerprint = fingerprint::extract("gpt-4o", &outcomes);
        let evidence = Evidence::new(&[]).with_model(&config, &fingerprint);

        let assessment = evaluate(&evidence);
        assert_eq!(assessment.red_flags.len(), 1);
        assert_eq!(assessment.red_flags[0].severity, Severity::Low);
        assert_eq!(assessment.verdict, Verdict::Legitimate);
    }

    #[test]
    fn rule_table_order_is_fixed() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "identity_mismatch",
                "inconsistent_cutoffs",
                "same_underlying_model",
                "relay_latency",
                "reported_model_mismatch",
            ]
        );
    }
}
