//! Messages API protocol (Anthropic and Anthropic-compatible relays).

use std::time::Duration;

use async_trait::async_trait;
use modelprobe_core::{Completion, ModelAdapter, ModelConfig, Result, TokenUsage};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::http;

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
/// `max_tokens` is mandatory on this API.
pub const DEFAULT_MAX_TOKENS: u64 = 4096;

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Adapter speaking `POST {base}/v1/messages` with `x-api-key` auth.
#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AnthropicAdapter {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn build_payload(prompt: &str, config: &ModelConfig) -> Value {
    let mut payload = json!({
        "model": config.model_name,
        "max_tokens": config.param_u64("max_tokens").unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": [{ "role": "user", "content": prompt }],
    });
    if let Some(system) = config.param_str("system_prompt").filter(|s| !s.trim().is_empty()) {
        payload["system"] = json!(system);
    }
    if let Some(temperature) = config.param_f64("temperature") {
        payload["temperature"] = json!(temperature);
    }
    payload
}

#[async_trait]
impl ModelAdapter for AnthropicAdapter {
    #[instrument(skip_all, fields(model = %config.model_name, protocol = "anthropic"))]
    async fn complete(
        &self,
        prompt: &str,
        config: &ModelConfig,
        timeout: Duration,
    ) -> Result<Completion> {
        let mut request = self
            .client
            .post(http::endpoint(&self.base_url, "/v1/messages"))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&build_payload(prompt, config));
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let (body, latency_ms): (MessagesResponse, f64) = http::send_json(request, timeout).await?;
        let text: String = body
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        Ok(Completion {
            text,
            latency_ms: Some(latency_ms),
            token_usage: body.usage.map(|u| TokenUsage {
                prompt: u.input_tokens,
                completion: u.output_tokens,
            }),
            reported_model_id: body.model.filter(|m| !m.is_empty()),
        })
    }
}
