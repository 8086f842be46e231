//! Prompt suites: ordered, opaque sequences of probes.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::error::{ProbeError, Result};

/// What a probe is designed to reveal. Only `Identity` changes extraction
/// behavior; the other categories feed style statistics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCategory {
    Identity,
    Capability,
    Fingerprint,
}

impl fmt::Display for ProbeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeCategory::Identity => f.write_str("identity"),
            ProbeCategory::Capability => f.write_str("capability"),
            ProbeCategory::Fingerprint => f.write_str("fingerprint"),
        }
    }
}

/// A single prompt challenge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Probe {
    /// Identifier, unique within the suite.
    pub probe_id: String,
    /// Prompt text sent verbatim to the adapter.
    pub prompt_text: String,
    pub category: ProbeCategory,
}

impl Probe {
    pub fn new(
        probe_id: impl Into<String>,
        category: ProbeCategory,
        prompt_text: impl Into<String>,
    ) -> Self {
        Self {
            probe_id: probe_id.into(),
            prompt_text: prompt_text.into(),
            category,
        }
    }
}

/// A named, ordered prompt suite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptSuite {
    pub name: String,
    pub probes: Vec<Probe>,
}

impl PromptSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            probes: Vec::new(),
        }
    }

    /// Append a probe (builder pattern).
    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Concatenate several suites into one, preserving order. Probe ids are
    /// prefixed with their suite name so they stay unique.
    pub fn combine(name: impl Into<String>, suites: &[PromptSuite]) -> Self {
        let probes = suites
            .iter()
            .flat_map(|suite| {
                suite.probes.iter().map(move |p| Probe {
                    probe_id: format!("{}/{}", suite.name, p.probe_id),
                    prompt_text: p.prompt_text.clone(),
                    category: p.category,
                })
            })
            .collect();
        Self {
            name: name.into(),
            probes,
        }
    }

    /// Reject empty suites and duplicate probe ids.
    pub fn validate(&self) -> Result<()> {
        if self.probes.is_empty() {
            return Err(ProbeError::config(format!(
                "prompt suite '{}' has no probes",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for probe in &self.probes {
            if probe.probe_id.trim().is_empty() {
                return Err(ProbeError::config(format!(
                    "prompt suite '{}' contains a probe with an empty id",
                    self.name
                )));
            }
            if !seen.insert(probe.probe_id.as_str()) {
                return Err(ProbeError::config(format!(
                    "prompt suite '{}' has duplicate probe id '{}'",
                    self.name, probe.probe_id
                )));
            }
        }
        Ok(())
    }

    /// SHA-256 hex digest over the serialized probe list (name excluded).
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for probe in &self.probes {
            hasher.update(probe.probe_id.as_bytes());
            hasher.update([0u8]);
            hasher.update(probe.category.to_string().as_bytes());
            hasher.update([0u8]);
            hasher.update(probe.prompt_text.as_bytes());
            hasher.update([0xffu8]);
        }
        hex::encode(hasher.finalize())
    }
}
