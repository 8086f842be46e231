//! Probe outcomes: one per (probe, model) pair within a run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::ProbeError;
use crate::domain::suite::{Probe, ProbeCategory};

/// Token accounting reported by the endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt + self.completion
    }
}

/// Classification of a failed probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Protocol,
    Auth,
    Http,
    Transport,
    /// Never dispatched because the run was cancelled.
    Cancelled,
    /// The probe task itself died (panic or join failure).
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Protocol => "protocol",
            FailureKind::Auth => "auth",
            FailureKind::Http => "http",
            FailureKind::Transport => "transport",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Serializable record of why a probe produced no response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ProbeFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "run cancelled before dispatch")
    }
}

impl From<&ProbeError> for ProbeFailure {
    fn from(err: &ProbeError) -> Self {
        let kind = match err {
            ProbeError::AdapterTimeout { .. } => FailureKind::Timeout,
            ProbeError::AdapterProtocol(_) | ProbeError::Serialization(_) => FailureKind::Protocol,
            ProbeError::AdapterAuth(_) => FailureKind::Auth,
            ProbeError::AdapterHttp { .. } => FailureKind::Http,
            ProbeError::AdapterTransport(_) | ProbeError::Io(_) => FailureKind::Transport,
            _ => FailureKind::Internal,
        };
        ProbeFailure::new(kind, err.to_string())
    }
}

/// Result of sending one probe to one model. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeOutcome {
    pub probe_id: String,
    pub category: ProbeCategory,
    pub model_name: String,
    /// `None` whenever `error` is set.
    pub response_text: Option<String>,
    pub latency_ms: f64,
    pub token_usage: Option<TokenUsage>,
    /// Model id echoed back by the endpoint, if any.
    pub reported_model_id: Option<String>,
    pub error: Option<ProbeFailure>,
    pub timestamp: DateTime<Utc>,
}

impl ProbeOutcome {
    /// Successful outcome.
    pub fn success(
        probe: &Probe,
        model_name: &str,
        response_text: String,
        latency_ms: f64,
        token_usage: Option<TokenUsage>,
        reported_model_id: Option<String>,
    ) -> Self {
        Self {
            probe_id: probe.probe_id.clone(),
            category: probe.category,
            model_name: model_name.to_string(),
            response_text: Some(response_text),
            latency_ms,
            token_usage,
            reported_model_id,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Failed outcome; `response_text` is always `None`.
    pub fn failure(probe: &Probe, model_name: &str, failure: ProbeFailure, latency_ms: f64) -> Self {
        Self {
            probe_id: probe.probe_id.clone(),
            category: probe.category,
            model_name: model_name.to_string(),
            response_text: None,
            latency_ms,
            token_usage: None,
            reported_model_id: None,
            error: Some(failure),
            timestamp: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Response text when the probe succeeded with a non-empty body.
    pub fn usable_text(&self) -> Option<&str> {
        if self.error.is_some() {
            return None;
        }
        self.response_text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe() -> Probe {
        Probe::new("who", ProbeCategory::Identity, "Which model are you?")
    }

    #[test]
    fn failure_has_no_response_text() {
        let out = ProbeOutcome::failure(
            &probe(),
            "gpt-4o",
            ProbeFailure::new(FailureKind::Timeout, "slow"),
            30_000.0,
        );
        assert!(out.is_error());
        assert!(out.response_text.is_none());
        assert!(out.usable_text().is_none());
    }

    #[test]
    fn blank_response_is_not_usable() {
        let out = ProbeOutcome::success(&probe(), "gpt-4o", "   ".to_string(), 10.0, None, None);
        assert!(!out.is_error());
        assert!(out.usable_text().is_none());
    }

    #[test]
    fn probe_error_maps_to_failure_kind() {
        let cases = [
            (ProbeError::AdapterTimeout { timeout_ms: 5 }, FailureKind::Timeout),
            (ProbeError::AdapterAuth("401".into()), FailureKind::Auth),
            (ProbeError::AdapterProtocol("no choices".into()), FailureKind::Protocol),
            (
                ProbeError::AdapterHttp {
                    status: 500,
                    body: String::new(),
                },
                FailureKind::Http,
            ),
            (ProbeError::AdapterTransport("reset".into()), FailureKind::Transport),
            (ProbeError::Storage("x".into()), FailureKind::Internal),
        ];
        for (err, kind) in cases {
            assert_eq!(ProbeFailure::from(&err).kind, kind, "{err}");
        }
    }

    #[test]
    fn token_usage_total() {
        let usage = TokenUsage {
            prompt: 12,
            completion: 30,
        };
        assert_eq!(usage.total(), 42);
    }
}
