//! Red-flag detection and fraud verdicts.
//!
//! An [`Evidence`] bundle (per-model configs and fingerprints plus pairwise
//! similarity scores) is run through the static [`rules::RULES`] table. Each
//! rule is a pure function producing zero or more [`RedFlag`]s; the
//! [`Verdict`] is then derived from the severity counts alone, so it does not
//! depend on rule or flag order.

pub mod names;
pub mod rules;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::compare::SimilarityScore;
use crate::domain::ModelConfig;
use crate::fingerprint::Fingerprint;

pub use rules::{Rule, LATENCY_FLAG_THRESHOLD_MS, RULES, SIMILARITY_FLAG_THRESHOLD};

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

/// Flag severity. Ordered so that `High` sorts first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FlagCategory {
    Identity,
    Consistency,
    Similarity,
    Latency,
}

impl FlagCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FlagCategory::Identity => "identity",
            FlagCategory::Consistency => "consistency",
            FlagCategory::Similarity => "similarity",
            FlagCategory::Latency => "latency",
        }
    }
}

impl fmt::Display for FlagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of rule-derived evidence of misrepresentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedFlag {
    pub severity: Severity,
    pub category: FlagCategory,
    pub description: String,
    pub evidence: String,
}

impl RedFlag {
    pub fn new(
        severity: Severity,
        category: FlagCategory,
        description: impl Into<String>,
        evidence: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            description: description.into(),
            evidence: evidence.into(),
        }
    }
}

/// Sort by severity (HIGH first), then category name, then description.
pub fn sort_flags(flags: &mut [RedFlag]) {
    flags.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| a.category.as_str().cmp(b.category.as_str()))
            .then_with(|| a.description.cmp(&b.description))
    });
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    FraudDetected,
    Inconclusive,
    Legitimate,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::FraudDetected => "FRAUD_DETECTED",
            Verdict::Inconclusive => "INCONCLUSIVE",
            Verdict::Legitimate => "LEGITIMATE",
        };
        f.write_str(s)
    }
}

/// Flag counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn of(flags: &[RedFlag]) -> Self {
        flags.iter().fold(Self::default(), |mut c, f| {
            match f.severity {
                Severity::High => c.high += 1,
                Severity::Medium => c.medium += 1,
                Severity::Low => c.low += 1,
            }
            c
        })
    }
}

/// `>= 2 HIGH` or `1 HIGH + >= 1 MEDIUM` is fraud; no HIGH and no MEDIUM is
/// legitimate; anything else is inconclusive.
pub fn derive_verdict(flags: &[RedFlag]) -> Verdict {
    let counts = SeverityCounts::of(flags);
    if counts.high >= 2 || (counts.high >= 1 && counts.medium >= 1) {
        Verdict::FraudDetected
    } else if counts.high == 0 && counts.medium == 0 {
        Verdict::Legitimate
    } else {
        Verdict::Inconclusive
    }
}

// ---------------------------------------------------------------------------
// Evidence & engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct ModelEvidence<'a> {
    pub config: &'a ModelConfig,
    pub fingerprint: &'a Fingerprint,
}

/// Everything the rules look at.
#[derive(Debug, Clone)]
pub struct Evidence<'a> {
    pub models: Vec<ModelEvidence<'a>>,
    pub comparisons: &'a [SimilarityScore],
}

impl<'a> Evidence<'a> {
    pub fn new(comparisons: &'a [SimilarityScore]) -> Self {
        Self {
            models: Vec::new(),
            comparisons,
        }
    }

    pub fn with_model(mut self, config: &'a ModelConfig, fingerprint: &'a Fingerprint) -> Self {
        self.models.push(ModelEvidence {
            config,
            fingerprint,
        });
        self
    }

    /// Models with enough data for rules to look at.
    pub fn usable_models(&self) -> impl Iterator<Item = &ModelEvidence<'a>> {
        self.models
            .iter()
            .filter(|m| !m.fingerprint.insufficient_data)
    }

    fn is_insufficient(&self, model_name: &str) -> bool {
        self.models
            .iter()
            .any(|m| m.config.model_name == model_name && m.fingerprint.insufficient_data)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assessment {
    pub verdict: Verdict,
    /// Sorted with [`sort_flags`].
    pub red_flags: Vec<RedFlag>,
}

/// Run every rule in table order and derive the verdict.
pub fn evaluate(evidence: &Evidence<'_>) -> Assessment {
    let mut red_flags: Vec<RedFlag> = RULES.iter().flat_map(|rule| (rule.check)(evidence)).collect();
    sort_flags(&mut red_flags);
    Assessment {
        verdict: derive_verdict(&red_flags),
        red_flags,
    }
}
