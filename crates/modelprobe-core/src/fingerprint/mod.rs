//! Behavioral fingerprints.
//!
//! A [`Fingerprint`] reduces every outcome a model produced into comparable
//! statistics. Extraction is a total, deterministic function: identical
//! ordered input always yields an identical fingerprint, and input without a
//! single usable response yields `insufficient_data = true` instead of an
//! error.

pub mod patterns;
pub mod text;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{ProbeCategory, ProbeError, ProbeOutcome, Result};

pub use text::{FormattingMarkers, StyleVector, TermCount, Vocabulary, TOP_TERMS};

/// Latency distribution over successful outcomes, in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LatencyStats {
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
}

impl LatencyStats {
    /// `None` when `samples` is empty.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
        Some(Self {
            mean,
            p50: nearest_rank(&sorted, 50.0),
            p95: nearest_rank(&sorted, 95.0),
            p99: nearest_rank(&sorted, 99.0),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice.
fn nearest_rank(sorted: &[f64], pct: f64) -> f64 {
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Mean token usage over outcomes that reported it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TokenStats {
    pub samples: usize,
    pub mean_prompt: f64,
    pub mean_completion: f64,
}

impl TokenStats {
    pub fn mean_total(&self) -> f64 {
        self.mean_prompt + self.mean_completion
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fingerprint {
    pub model_name: String,
    /// Outcomes with a non-empty response and no error.
    pub sample_count: usize,
    pub error_count: usize,
    pub insufficient_data: bool,
    pub style: StyleVector,
    pub vocabulary: Vocabulary,
    pub formatting: FormattingMarkers,
    pub latency: Option<LatencyStats>,
    pub tokens: Option<TokenStats>,
    /// Model identifiers found in identity responses, with occurrence counts.
    pub identity_claims: BTreeMap<String, usize>,
    pub reported_model_ids: BTreeMap<String, usize>,
    /// Distinct knowledge cutoffs as `YYYY-MM`.
    pub claimed_cutoffs: BTreeSet<String>,
}

impl Fingerprint {
    /// Fingerprint with no usable samples.
    pub fn insufficient(model_name: impl Into<String>, error_count: usize) -> Self {
        Self {
            model_name: model_name.into(),
            sample_count: 0,
            error_count,
            insufficient_data: true,
            style: StyleVector::default(),
            vocabulary: Vocabulary::default(),
            formatting: FormattingMarkers::default(),
            latency: None,
            tokens: None,
            identity_claims: BTreeMap::new(),
            reported_model_ids: BTreeMap::new(),
            claimed_cutoffs: BTreeSet::new(),
        }
    }

    /// Reject a fingerprint built without a single usable response.
    pub fn require_data(self) -> Result<Self> {
        if self.insufficient_data {
            return Err(ProbeError::InsufficientData {
                model: self.model_name,
            });
        }
        Ok(self)
    }

    pub fn mean_latency_ms(&self) -> Option<f64> {
        self.latency.map(|l| l.mean)
    }

    /// Distinct identity claims, sorted.
    pub fn claim_set(&self) -> BTreeSet<&str> {
        self.identity_claims.keys().map(String::as_str).collect()
    }

    /// Top vocabulary terms as a set.
    pub fn term_set(&self) -> BTreeSet<&str> {
        self.vocabulary
            .top_terms
            .iter()
            .map(|t| t.term.as_str())
            .collect()
    }
}

/// Reduce a model's outcomes into a [`Fingerprint`].
pub fn extract<'a, I>(model_name: &str, outcomes: I) -> Fingerprint
where
    I: IntoIterator<Item = &'a ProbeOutcome>,
{
    let mut error_count = 0usize;
    let mut usable: Vec<&ProbeOutcome> = Vec::new();
    for outcome in outcomes {
        if outcome.is_error() {
            error_count += 1;
        } else if outcome.usable_text().is_some() {
            usable.push(outcome);
        }
    }

    if usable.is_empty() {
        return Fingerprint::insufficient(model_name, error_count);
    }

    let texts: Vec<&str> = usable.iter().filter_map(|o| o.usable_text()).collect();

    let mut identity_claims = BTreeMap::new();
    let mut claimed_cutoffs = BTreeSet::new();
    for outcome in usable.iter().filter(|o| o.category == ProbeCategory::Identity) {
        if let Some(text) = outcome.usable_text() {
            patterns::collect_identity_claims(text, &mut identity_claims);
            claimed_cutoffs.extend(patterns::extract_cutoffs(text));
        }
    }

    let mut reported_model_ids = BTreeMap::new();
    for id in usable.iter().filter_map(|o| o.reported_model_id.as_deref()) {
        let id = id.trim();
        if !id.is_empty() {
            *reported_model_ids.entry(id.to_string()).or_insert(0) += 1;
        }
    }

    let latencies: Vec<f64> = usable.iter().map(|o| o.latency_ms).collect();
    let usages: Vec<_> = usable.iter().filter_map(|o| o.token_usage).collect();
    let tokens = (!usages.is_empty()).then(|| {
        let n = usages.len() as f64;
        TokenStats {
            samples: usages.len(),
            mean_prompt: usages.iter().map(|u| u.prompt as f64).sum::<f64>() / n,
            mean_completion: usages.iter().map(|u| u.completion as f64).sum::<f64>() / n,
        }
    });

    Fingerprint {
        model_name: model_name.to_string(),
        sample_count: usable.len(),
        error_count,
        insufficient_data: false,
        style: text::style(&texts),
        vocabulary: text::vocabulary(&texts),
        formatting: text::formatting(&texts),
        latency: LatencyStats::from_samples(&latencies),
        tokens,
        identity_claims,
        reported_model_ids,
        claimed_cutoffs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureKind, Probe, ProbeFailure, TokenUsage};

    fn identity(id: &str) -> Probe {
        Probe::new(id, ProbeCategory::Identity, "who are you?")
    }

    fn ok(probe: &Probe, text: &str, latency: f64) -> ProbeOutcome {
        ProbeOutcome::success(probe, "m", text.to_string(), latency, None, None)
    }

    #[test]
    fn cutoffs_from_identity_probes_are_collected() {
        let outcomes = vec![
            ok(&identity("a"), "My knowledge cutoff is April 2024.", 100.0),
            ok(&identity("b"), "My training data runs until March 2025.", 100.0),
            ok(&identity("c"), "Knowledge cutoff: June 2024", 100.0),
        ];
        let fp = extract("m", &outcomes);
        let cutoffs: Vec<&str> = fp.claimed_cutoffs.iter().map(String::as_str).collect();
        assert_eq!(cutoffs, vec!["2024-04", "2024-06", "2025-03"]);
    }

    #[test]
    fn capability_responses_do_not_produce_claims() {
        let cap = Probe::new("cap", ProbeCategory::Capability, "compare models");
        let outcomes = vec![ok(&cap, "gpt-4 is older than claude-3.", 10.0)];
        let fp = extract("m", &outcomes);
        assert!(fp.identity_claims.is_empty());
        assert!(!fp.insufficient_data);
    }

    #[test]
    fn all_errors_mean_insufficient_data() {
        let probe = identity("a");
        let outcomes: Vec<ProbeOutcome> = (0..3)
            .map(|_| {
                ProbeOutcome::failure(
                    &probe,
                    "m",
                    ProbeFailure::new(FailureKind::Timeout, "slow"),
                    30_000.0,
                )
            })
            .collect();
        let fp = extract("m", &outcomes);
        assert!(fp.insufficient_data);
        assert_eq!(fp.error_count, 3);
        assert_eq!(fp.sample_count, 0);
        assert!(fp.latency.is_none());

        let err = fp.require_data().unwrap_err();
        assert!(matches!(err, ProbeError::InsufficientData { ref model } if model == "m"));
        assert!(extract("m", [&ok(&probe, "hi", 1.0)]).require_data().is_ok());
    }

    #[test]
    fn extraction_is_deterministic() {
        let probe = identity("a");
        let outcomes = vec![
            ok(&probe, "I am claude-3-5-sonnet. Happy to help!", 120.0),
            ok(&probe, "- one\n- two\n\nLet me know.", 80.0),
        ];
        assert_eq!(extract("m", &outcomes), extract("m", &outcomes));
    }

    #[test]
    fn latency_percentiles_use_nearest_rank() {
        let samples: Vec<f64> = (1..=20).map(|v| v as f64 * 10.0).collect();
        let stats = LatencyStats::from_samples(&samples).unwrap();
        assert_eq!(stats.p50, 100.0);
        assert_eq!(stats.p95, 190.0);
        assert_eq!(stats.p99, 200.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 200.0);
        assert_eq!(stats.mean, 105.0);
    }

    #[test]
    fn token_means_skip_outcomes_without_usage() {
        let probe = identity("a");
        let with = ProbeOutcome::success(
            &probe,
            "m",
            "hi".into(),
            1.0,
            Some(TokenUsage {
                prompt: 10,
                completion: 30,
            }),
            Some("gpt-4o-2024-08-06".into()),
        );
        let without = ok(&probe, "hello", 1.0);
        let fp = extract("m", [&with, &without]);
        let tokens = fp.tokens.unwrap();
        assert_eq!(tokens.samples, 1);
        assert_eq!(tokens.mean_total(), 40.0);
        assert_eq!(fp.reported_model_ids.get("gpt-4o-2024-08-06"), Some(&1));
    }
}
