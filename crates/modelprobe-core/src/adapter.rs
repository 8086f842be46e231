//! Model adapter boundary.
//!
//! The core never sees wire formats. Protocol-specific implementations live in
//! `modelprobe-adapters`; an [`AdapterFactory`] picks one per [`ModelConfig`]
//! from configuration alone.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ModelConfig, Result, TokenUsage};

/// Normalized completion returned by any adapter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub text: String,
    /// Adapter-measured latency; the runner measures wall time when absent.
    pub latency_ms: Option<f64>,
    pub token_usage: Option<TokenUsage>,
    /// `model` field echoed by the endpoint.
    pub reported_model_id: Option<String>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Single capability every provider protocol implements.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Send `prompt` to the model described by `config`.
    ///
    /// Implementations should honour `timeout` themselves; the runner also
    /// enforces it externally.
    async fn complete(
        &self,
        prompt: &str,
        config: &ModelConfig,
        timeout: Duration,
    ) -> Result<Completion>;
}

/// Resolves the adapter for a model config. Called once per model before any
/// probe is dispatched; errors here are configuration errors.
pub trait AdapterFactory: Send + Sync {
    fn adapter_for(&self, config: &ModelConfig) -> Result<Arc<dyn ModelAdapter>>;
}
