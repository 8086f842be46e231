//! Fingerprint comparison.
//!
//! [`compare`] scores two fingerprints along four dimensions and combines them
//! with fixed weights. The result is symmetric: model names are stored in
//! sorted order and every dimension is a symmetric function of both sides.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{BenchmarkRunResult, RunId};
use crate::fingerprint::{self, Fingerprint, LatencyStats, StyleVector};
use crate::obs;

/// Merged-run score at or above which two runs are classified as a match.
pub const MATCH_THRESHOLD: f64 = 0.85;

/// Merged-run score at or below which two runs are classified as a mismatch.
pub const MISMATCH_THRESHOLD: f64 = 0.55;

pub const LATENCY_WEIGHT: f64 = 0.20;
pub const STYLE_WEIGHT: f64 = 0.40;
pub const VOCABULARY_WEIGHT: f64 = 0.25;
pub const IDENTITY_WEIGHT: f64 = 0.15;

/// Per-dimension similarity, each in `[0, 1]`. `None` means the dimension
/// had no data on at least one side and was left out of the overall score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct DimensionScores {
    pub latency: Option<f64>,
    pub style: Option<f64>,
    pub vocabulary: Option<f64>,
    pub identity: Option<f64>,
}

impl DimensionScores {
    fn weighted(&self) -> [(Option<f64>, f64); 4] {
        [
            (self.latency, LATENCY_WEIGHT),
            (self.style, STYLE_WEIGHT),
            (self.vocabulary, VOCABULARY_WEIGHT),
            (self.identity, IDENTITY_WEIGHT),
        ]
    }

    /// Weighted mean over the dimensions present.
    pub fn overall(&self) -> Option<f64> {
        let (sum, weight) = self
            .weighted()
            .iter()
            .filter_map(|(score, w)| score.map(|s| (s * w, *w)))
            .fold((0.0, 0.0), |(sum, total), (s, w)| (sum + s, total + w));
        (weight > 0.0).then(|| sum / weight)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarityScore {
    /// Lexicographically smaller model name.
    pub model_a: String,
    pub model_b: String,
    pub overall_score: Option<f64>,
    pub dimensions: DimensionScores,
    /// Identity claims made by both models.
    pub shared_claims: Vec<String>,
    /// Set when either fingerprint had insufficient data.
    pub low_confidence: bool,
}

impl SimilarityScore {
    /// Overall score, only when the comparison is confident.
    pub fn confident_score(&self) -> Option<f64> {
        if self.low_confidence {
            None
        } else {
            self.overall_score
        }
    }

    pub fn involves(&self, model_name: &str) -> bool {
        self.model_a == model_name || self.model_b == model_name
    }
}

/// `1 - |x - y| / max(|x|, |y|, floor)`.
fn relative_similarity(x: f64, y: f64, floor: f64) -> f64 {
    let denom = x.abs().max(y.abs()).max(floor);
    (1.0 - (x - y).abs() / denom).clamp(0.0, 1.0)
}

fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn jaccard(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> Option<f64> {
    let union = a.union(b).count();
    if union == 0 {
        return None;
    }
    Some(a.intersection(b).count() as f64 / union as f64)
}

fn latency_similarity(a: &LatencyStats, b: &LatencyStats) -> f64 {
    mean([
        relative_similarity(a.mean, b.mean, 1.0),
        relative_similarity(a.p50, b.p50, 1.0),
        relative_similarity(a.p95, b.p95, 1.0),
    ])
}

fn style_similarity(a: &StyleVector, b: &StyleVector) -> f64 {
    mean(
        a.features()
            .into_iter()
            .zip(b.features())
            .map(|(x, y)| relative_similarity(x, y, 0.001)),
    )
}

/// Symmetric similarity between two fingerprints.
pub fn compare(a: &Fingerprint, b: &Fingerprint) -> SimilarityScore {
    let (a, b) = if a.model_name <= b.model_name {
        (a, b)
    } else {
        (b, a)
    };

    if a.insufficient_data || b.insufficient_data {
        return SimilarityScore {
            model_a: a.model_name.clone(),
            model_b: b.model_name.clone(),
            overall_score: None,
            dimensions: DimensionScores::default(),
            shared_claims: Vec::new(),
            low_confidence: true,
        };
    }

    let claims_a = a.claim_set();
    let claims_b = b.claim_set();
    let dimensions = DimensionScores {
        latency: match (&a.latency, &b.latency) {
            (Some(la), Some(lb)) => Some(latency_similarity(la, lb)),
            _ => None,
        },
        style: Some(style_similarity(&a.style, &b.style)),
        vocabulary: jaccard(&a.term_set(), &b.term_set()),
        identity: jaccard(&claims_a, &claims_b),
    };

    SimilarityScore {
        model_a: a.model_name.clone(),
        model_b: b.model_name.clone(),
        overall_score: dimensions.overall(),
        dimensions,
        shared_claims: claims_a
            .intersection(&claims_b)
            .map(|c| c.to_string())
            .collect(),
        low_confidence: false,
    }
}

/// Every unordered pair of distinct fingerprints, in input order.
pub fn pairwise(fingerprints: &[Fingerprint]) -> Vec<SimilarityScore> {
    let mut scores = Vec::new();
    for (i, a) in fingerprints.iter().enumerate() {
        for b in &fingerprints[i + 1..] {
            scores.push(compare(a, b));
        }
    }
    scores
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Match,
    Mismatch,
    Inconclusive,
}

impl Classification {
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            Some(s) if s >= MATCH_THRESHOLD => Classification::Match,
            Some(s) if s <= MISMATCH_THRESHOLD => Classification::Mismatch,
            _ => Classification::Inconclusive,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::Match => "MATCH",
            Classification::Mismatch => "MISMATCH",
            Classification::Inconclusive => "INCONCLUSIVE",
        };
        f.write_str(s)
    }
}

/// Baseline run against suspect run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunComparison {
    pub baseline_run_id: RunId,
    pub suspect_run_id: RunId,
    pub classification: Classification,
    /// Score of the merged run fingerprints.
    pub score: SimilarityScore,
    /// Every baseline model against every suspect model.
    pub model_scores: Vec<SimilarityScore>,
    pub details: String,
}

/// Compare two archived runs.
///
/// Each run is merged into a single fingerprint over all of its outcomes
/// before scoring.
pub fn compare_runs(baseline: &BenchmarkRunResult, suspect: &BenchmarkRunResult) -> RunComparison {
    let merged_baseline = fingerprint::extract(&format!("baseline:{}", baseline.run_id), &baseline.outcomes);
    let merged_suspect = fingerprint::extract(&format!("suspect:{}", suspect.run_id), &suspect.outcomes);
    let score = compare(&merged_baseline, &merged_suspect);
    let classification = Classification::from_score(score.confident_score());

    let mut model_scores = Vec::new();
    for b in &baseline.models {
        for s in &suspect.models {
            let fb = baseline
                .fingerprint_for(&b.model_name)
                .cloned()
                .unwrap_or_else(|| {
                    fingerprint::extract(&b.model_name, baseline.outcomes_for(&b.model_name))
                });
            let fs = suspect
                .fingerprint_for(&s.model_name)
                .cloned()
                .unwrap_or_else(|| {
                    fingerprint::extract(&s.model_name, suspect.outcomes_for(&s.model_name))
                });
            model_scores.push(compare(&fb, &fs));
        }
    }

    obs::emit_comparison(
        baseline.run_id.as_str(),
        suspect.run_id.as_str(),
        score.confident_score(),
        &classification.to_string(),
    );

    RunComparison {
        baseline_run_id: baseline.run_id.clone(),
        suspect_run_id: suspect.run_id.clone(),
        classification,
        details: describe(&score, classification),
        score,
        model_scores,
    }
}

fn describe(score: &SimilarityScore, classification: Classification) -> String {
    let Some(overall) = score.confident_score() else {
        return "Not enough successful responses on one or both sides to compare.".to_string();
    };
    let d = &score.dimensions;
    let part = |label: &str, v: Option<f64>| match v {
        Some(v) => format!("{label} {:.1}%", v * 100.0),
        None => format!("{label} n/a"),
    };
    format!(
        "{classification}: overall similarity {:.1}% ({}, {}, {}, {})",
        overall * 100.0,
        part("latency", d.latency),
        part("style", d.style),
        part("vocabulary", d.vocabulary),
        part("identity", d.identity),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureKind, Probe, ProbeCategory, ProbeFailure, ProbeOutcome};

    fn probe(id: &str) -> Probe {
        Probe::new(id, ProbeCategory::Identity, "who are you?")
    }

    fn fp(name: &str, texts: &[(&str, f64)]) -> Fingerprint {
        let outcomes: Vec<ProbeOutcome> = texts
            .iter()
            .enumerate()
            .map(|(i, (t, l))| {
                ProbeOutcome::success(&probe(&format!("p{i}")), name, t.to_string(), *l, None, None)
            })
            .collect();
        fingerprint::extract(name, &outcomes)
    }

    fn broken(name: &str) -> Fingerprint {
        let outcome = ProbeOutcome::failure(
            &probe("p0"),
            name,
            ProbeFailure::new(FailureKind::Timeout, "slow"),
            1.0,
        );
        fingerprint::extract(name, [&outcome])
    }

    #[test]
    fn comparison_is_symmetric() {
        let a = fp("alpha", &[("I am claude-3-opus. Happy to help!", 900.0)]);
        let b = fp(
            "beta",
            &[("Sure!\n- I am gpt-4o\n- made by OpenAI\n\nLet me know.", 400.0)],
        );
        assert_eq!(compare(&a, &b), compare(&b, &a));
        assert_eq!(compare(&b, &a).model_a, "alpha");
    }

    #[test]
    fn self_comparison_is_one() {
        let a = fp(
            "alpha",
            &[
                ("I am claude-3-opus. Happy to help!", 900.0),
                ("My knowledge cutoff is April 2024.", 700.0),
            ],
        );
        let score = compare(&a, &a);
        assert_eq!(score.overall_score, Some(1.0));
        assert!(!score.low_confidence);
    }

    #[test]
    fn insufficient_side_is_low_confidence() {
        let a = fp("alpha", &[("hello there", 10.0)]);
        let score = compare(&a, &broken("beta"));
        assert!(score.low_confidence);
        assert_eq!(score.overall_score, None);
        assert_eq!(score.confident_score(), None);
    }

    #[test]
    fn identity_dimension_absent_without_claims() {
        let a = fp("alpha", &[("plain words only", 10.0)]);
        let b = fp("beta", &[("other plain words", 10.0)]);
        let score = compare(&a, &b);
        assert_eq!(score.dimensions.identity, None);
        assert!(score.overall_score.is_some());
    }

    #[test]
    fn shared_claims_are_reported() {
        let a = fp("alpha", &[("I am gpt-4o.", 10.0)]);
        let b = fp("beta", &[("Yes, gpt-4o here.", 10.0)]);
        let score = compare(&a, &b);
        assert_eq!(score.shared_claims, vec!["gpt-4o".to_string()]);
        assert_eq!(score.dimensions.identity, Some(1.0));
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(Classification::from_score(Some(0.85)), Classification::Match);
        assert_eq!(Classification::from_score(Some(0.55)), Classification::Mismatch);
        assert_eq!(Classification::from_score(Some(0.7)), Classification::Inconclusive);
        assert_eq!(Classification::from_score(None), Classification::Inconclusive);
    }

    #[test]
    fn relative_similarity_bounds() {
        assert_eq!(relative_similarity(0.0, 0.0, 0.001), 1.0);
        assert_eq!(relative_similarity(100.0, 50.0, 1.0), 0.5);
        assert_eq!(relative_similarity(-1.0, 1.0, 1.0), 0.0);
    }

    #[test]
    fn pairwise_covers_each_pair_once() {
        let fps = vec![
            fp("a", &[("one", 1.0)]),
            fp("b", &[("two", 1.0)]),
            fp("c", &[("three", 1.0)]),
        ];
        let scores = pairwise(&fps);
        assert_eq!(scores.len(), 3);
    }
}
